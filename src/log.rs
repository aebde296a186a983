macro_rules! trace {
    ($($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        tracing::trace!($($arg)+);
    };
}

macro_rules! debug {
    ($($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        tracing::debug!($($arg)+);
    };
}

macro_rules! info {
    ($($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        tracing::info!($($arg)+);
    };
}

pub(crate) use debug;
pub(crate) use info;
pub(crate) use trace;
