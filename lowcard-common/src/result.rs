pub type Result<T> = std::result::Result<T, crate::error::Error>;

#[macro_export]
macro_rules! verify_that {
    ($expr:expr) => {{
        let result = $expr;
        $crate::result::verify_that(result, stringify!($expr))?;
    }};
}

pub fn verify_that(predicate: bool, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        Err(crate::error::Error::logical(format!(
            "broken invariant: {condition}"
        )))
    }
}
