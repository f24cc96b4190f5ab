pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// Fails the enclosing function with a configuration error unless `$expr` holds.
#[macro_export]
macro_rules! verify_config {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_config(result, $name, stringify!($expr))?;
    }};
}

#[inline]
pub fn verify_config(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        invalid_config(name, condition)
    }
}

#[cold]
pub fn invalid_config(name: &str, condition: &str) -> Result<()> {
    Err(crate::error::ErrorKind::Configuration {
        name: name.to_string(),
        message: format!("expected {condition}"),
    }
    .into())
}
