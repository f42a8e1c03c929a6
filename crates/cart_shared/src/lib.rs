pub mod domain;
pub mod error;
pub mod protocol;

pub use domain::{compute_total, validate, CartId, CartLineItem, Money, OptionId, Quantity, RawLineItem};
pub use error::{ErrorKind, FailureKind, ValidationError};
pub use protocol::{PayloadFormat, SaveResponse, SaveResult};
