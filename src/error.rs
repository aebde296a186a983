use thiserror::Error;

/// Errors returned by the driver.
///
/// `E` is the error type of the underlying [`RegisterPort`](crate::RegisterPort).
#[derive(Error, Debug, PartialEq, Clone, Copy)]
pub enum Error<E> {
    /// A register transaction failed on the transport.
    #[error("{name}: transaction at register {register} failed: {cause:?}")]
    Transport {
        name: &'static str,
        register: u8,
        cause: E,
    },
    /// The device kept reporting `SYS_INIT` while being brought up.
    #[error("{name}: device not ready")]
    NotReady { name: &'static str },
    /// An argument that can not be clamped into range.
    #[error("invalid parameter")]
    InvalidParameter,
}

impl<E> Error<E> {
    pub(crate) fn transport(name: &'static str, register: u8) -> impl FnOnce(E) -> Self {
        move |cause| Error::Transport {
            name,
            register,
            cause,
        }
    }
}
