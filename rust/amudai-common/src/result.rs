pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// Fails the enclosing function with an `OutOfRange` error unless the
/// predicate holds.
#[macro_export]
macro_rules! verify_range {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_range(result, stringify!($name), stringify!($expr))?;
    }};
}

#[macro_export]
macro_rules! verify_arg {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_arg(result, stringify!($name), stringify!($expr))?;
    }};
}

#[inline]
pub fn verify_range(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        out_of_range(name, condition)
    }
}

#[inline]
pub fn verify_arg(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        invalid_arg(name, condition)
    }
}

#[cold]
pub fn out_of_range(name: &str, condition: &str) -> Result<()> {
    Err(crate::error::ErrorKind::OutOfRange {
        name: name.to_string(),
        message: format!("expected {condition}"),
    }
    .into())
}

#[cold]
pub fn invalid_arg(name: &str, condition: &str) -> Result<()> {
    Err(crate::error::ErrorKind::InvalidArgument {
        name: name.to_string(),
        message: condition.to_string(),
    }
    .into())
}
