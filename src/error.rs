use std::{
    error::Error,
    fmt::{Display, Formatter},
};

/// Result type used throughout the crate.
pub type TrackerMapResult<T> = Result<T, Box<dyn Error>>;

/// A systemic failure, such as an invalid configuration or a data source with nothing usable.
#[derive(Debug, Clone, Copy)]
pub struct TrackerMapError {
    pub msg: &'static str,
}

impl Display for TrackerMapError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.msg)
    }
}

impl Error for TrackerMapError {}

/// A place name search that the geocoder could not resolve.
///
/// This is recoverable, the user should be asked to try again. It never touches the state of the
/// map, legend, or table.
#[derive(Debug, Clone, Copy)]
pub struct GeocodeError {
    pub msg: &'static str,
}

impl GeocodeError {
    pub const NOT_FOUND: GeocodeError = GeocodeError {
        msg: "Could not find your address or location. Please try again",
    };
}

impl Display for GeocodeError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.msg)
    }
}

impl Error for GeocodeError {}
