//! Request-level admission hook.

use crate::message::HttpMessage;
use crate::session::ResponseCorrelator;

/// Outcome of admission.
#[derive(Debug)]
pub enum Admission {
    /// Hand the message and its reply path to the processor.
    Forward(ResponseCorrelator),
    /// The gate kept the reply path and owns the exchange from here.
    /// The processor is not called.
    ShortCircuit,
}

/// Optional check run on every non-upgrade request head.
///
/// A gate that short-circuits is expected to complete the correlator it was
/// given (e.g. with a 429); dropping it leaves the exchange unanswered.
pub trait DispatchGate: Send + Sync {
    fn admit(&self, message: &HttpMessage, correlator: ResponseCorrelator) -> Admission;
}

impl<F> DispatchGate for F
where
    F: Fn(&HttpMessage, ResponseCorrelator) -> Admission + Send + Sync,
{
    fn admit(&self, message: &HttpMessage, correlator: ResponseCorrelator) -> Admission {
        self(message, correlator)
    }
}
