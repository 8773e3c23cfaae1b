use strata_macros::test_traced;
use tracing::{debug, error, info, trace};

#[test_traced(level = "INFO")]
fn test_info_level() {
    info!("shown");
    debug!("filtered");
    assert_eq!(2 + 2, 4);
}

#[test_traced]
fn test_default_level() {
    debug!("shown");
    trace!("filtered");
    assert_eq!(3 * 3, 9);
}

#[test_traced(level = "error")]
fn test_lowercase_level() {
    error!("shown");
    assert_eq!(5 * 2, 10);
}

#[test_traced]
#[should_panic(expected = "inside subscriber")]
fn test_panic_propagates() {
    panic!("inside subscriber");
}
