mod debounce_timer;
pub(crate) use debounce_timer::*;
