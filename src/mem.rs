/// Applies a fallible closure to a value and then returns that value.
pub fn try_init<T, F, O, E>(mut value: T, f: F) -> Result<T, E>
where
  F: FnOnce(&mut T) -> Result<O, E>,
{
  f(&mut value)?;
  Ok(value)
}
