use std::env;
use std::fmt::Debug;
use std::str::FromStr;

/// Returns the value of the named environment variable if it exists or panics.
pub fn get_variable(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| panic!("must define {} environment variable", name))
}

/// Parses the named environment variable or panics.
pub fn parse_variable<T: FromStr>(name: &str) -> T
where
    T::Err: Debug,
{
    let value = get_variable(name);

    value
        .parse()
        .unwrap_or_else(|e| panic!("could not parse {}={:?}: {:?}", name, value, e))
}

/// Parses the named environment variable if it is set and not blank.
/// Panics if it is set to something unparseable.
pub fn optional_variable<T: FromStr>(name: &str) -> Option<T>
where
    T::Err: Debug,
{
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(parse_variable(name)),
        _ => None,
    }
}
