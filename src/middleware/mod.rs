pub mod correlation;

pub use correlation::{Correlation, CorrelationId, CORRELATION_ID_HEADER};
