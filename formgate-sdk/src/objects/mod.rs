//! JSON objects exchanged with formgate and its payment gateway.

pub mod error;
pub mod nonce;
pub mod outcome;
pub mod payment;

pub use error::ErrorBody;
pub use nonce::NonceResponse;
pub use outcome::{OutcomeTag, PaymentStatus};
pub use payment::{
    FormAccepted, PaymentInitiated, PaymentMethod, ReturnUrls, TransactionRequest,
    TransactionResponse,
};
