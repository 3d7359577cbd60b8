//! ---
//! ss_section: "14-licensing-system"
//! ss_subsection: "module"
//! ss_type: "source"
//! ss_scope: "code"
//! ss_description: "Thread-local temporary feature grants."
//! ss_version: "v0.0.0-prealpha"
//! ss_owner: "tbd"
//! ---
//! Temporary feature grants scoped to the current thread.
//!
//! Registering a license decodes the key with the Text serializer, which is
//! itself quota-gated. An [`AccessGrant`] lets that bootstrap path through
//! without a license. Grants live on a per-thread stack: a grant taken on one
//! thread never authorises work on another, and new threads start empty.

use std::cell::RefCell;
use std::marker::PhantomData;

use tracing::{trace, warn};

use crate::error::{LicenseError, Result};
use crate::features::FeatureSet;

thread_local! {
    static GRANTS: RefCell<Vec<FeatureSet>> = const { RefCell::new(Vec::new()) };
}

/// Guard for a temporary grant. Dropping it restores the previous grant.
#[must_use = "the grant is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct AccessGrant {
    depth: usize,
    // Pinned to the thread whose stack it pushed onto.
    _not_send: PhantomData<*const ()>,
}

impl AccessGrant {
    /// Push `features` onto this thread's grant stack.
    pub fn acquire(features: FeatureSet) -> Self {
        let depth = GRANTS.with(|grants| {
            let mut grants = grants.borrow_mut();
            grants.push(features);
            grants.len()
        });
        trace!(features = %features, depth, "access grant acquired");
        Self {
            depth,
            _not_send: PhantomData,
        }
    }
}

impl Drop for AccessGrant {
    fn drop(&mut self) {
        GRANTS.with(|grants| {
            let mut grants = grants.borrow_mut();
            if grants.len() != self.depth {
                warn!(
                    expected = self.depth,
                    actual = grants.len(),
                    "access grants released out of order"
                );
            }
            grants.truncate(self.depth.saturating_sub(1));
        });
    }
}

/// Innermost grant held by the calling thread.
#[must_use]
pub fn current_grant() -> Option<FeatureSet> {
    GRANTS.with(|grants| grants.borrow().last().copied())
}

/// Capability handed to the service client so it can parse responses with
/// the Text serializer.
///
/// This is friction against casual reuse by unrelated code, not a security
/// boundary: anything linked into the process can mint one.
#[derive(Debug)]
pub struct ClientAccessToken {
    _private: (),
}

impl ClientAccessToken {
    /// Token for the service client. Not for use by other components.
    #[doc(hidden)]
    #[must_use]
    pub fn for_service_client() -> Self {
        Self { _private: () }
    }
}

/// Temporary grant requested by another component.
///
/// Only the service client may ask, and only for Text.
pub fn request_access(
    _token: &ClientAccessToken,
    source: FeatureSet,
    requested: FeatureSet,
) -> Result<AccessGrant> {
    if source != FeatureSet::CLIENT || requested != FeatureSet::TEXT {
        warn!(source = %source, requested = %requested, "rejected access request");
        return Err(LicenseError::UnauthorizedAccessRequest);
    }
    Ok(AccessGrant::acquire(requested))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn nested_grants_restore_previous_top() {
        assert_eq!(current_grant(), None);
        {
            let _outer = AccessGrant::acquire(FeatureSet::TEXT);
            assert_eq!(current_grant(), Some(FeatureSet::TEXT));
            {
                let _inner = AccessGrant::acquire(FeatureSet::REDIS);
                assert_eq!(current_grant(), Some(FeatureSet::REDIS));
            }
            assert_eq!(current_grant(), Some(FeatureSet::TEXT));
        }
        assert_eq!(current_grant(), None);
    }

    #[test]
    fn grant_is_released_on_error_paths() {
        fn failing() -> Result<()> {
            let _grant = AccessGrant::acquire(FeatureSet::TEXT);
            Err(LicenseError::LicenseInvalid { customer_id: None })
        }
        assert!(failing().is_err());
        assert_eq!(current_grant(), None);
    }

    #[test]
    fn grant_is_released_on_panic() {
        let result = std::panic::catch_unwind(|| {
            let _grant = AccessGrant::acquire(FeatureSet::TEXT);
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(current_grant(), None);
    }

    #[test]
    fn grants_do_not_cross_threads() {
        let _grant = AccessGrant::acquire(FeatureSet::TEXT);
        let (ready_tx, ready_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let worker = thread::spawn(move || {
            let _own = AccessGrant::acquire(FeatureSet::ORMLITE);
            ready_tx.send(current_grant()).unwrap();
            done_rx.recv().unwrap();
        });
        assert_eq!(ready_rx.recv().unwrap(), Some(FeatureSet::ORMLITE));
        assert_eq!(current_grant(), Some(FeatureSet::TEXT));
        done_tx.send(()).unwrap();
        worker.join().unwrap();

        let fresh = thread::spawn(current_grant).join().unwrap();
        assert_eq!(fresh, None);
    }

    #[test]
    fn only_client_text_requests_are_honoured() {
        let token = ClientAccessToken::for_service_client();
        {
            let _grant = request_access(&token, FeatureSet::CLIENT, FeatureSet::TEXT).unwrap();
            assert_eq!(current_grant(), Some(FeatureSet::TEXT));
        }
        assert!(matches!(
            request_access(&token, FeatureSet::REDIS, FeatureSet::TEXT),
            Err(LicenseError::UnauthorizedAccessRequest)
        ));
        assert!(matches!(
            request_access(&token, FeatureSet::CLIENT, FeatureSet::ALL),
            Err(LicenseError::UnauthorizedAccessRequest)
        ));
        assert_eq!(current_grant(), None);
    }
}
