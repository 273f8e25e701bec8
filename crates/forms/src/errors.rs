use thiserror::Error;

use crate::engine::options::GateVeto;
use crate::path::PathError;
use crate::transport::TransportError;

/// Crate-level error type for controller operations.
///
/// Remote failures never escape the engine raw; public operations fold them
/// into form state and outcome enums. What remains here are the synchronous
/// failures a caller can actually act on.
#[derive(Debug, Error)]
pub enum FormError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Vetoed(#[from] GateVeto),
}
