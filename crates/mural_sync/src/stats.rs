use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters for one node's sync traffic.
#[derive(Debug, Default)]
pub struct SyncStats {
    requests_sent: AtomicU64,
    requests_served: AtomicU64,
    requests_unanswered: AtomicU64,
    transfers_sent: AtomicU64,
    transfers_staged: AtomicU64,
    duplicates_discarded: AtomicU64,
    resources_applied: AtomicU64,
    apply_failures: AtomicU64,
    releases_sent: AtomicU64,
    releases_applied: AtomicU64,
    protocol_violations: AtomicU64,
    acknowledgements: AtomicU64,
    user_messages_received: AtomicU64,
}

/// Point-in-time copy of [`SyncStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStatsSnapshot {
    pub requests_sent: u64,
    pub requests_served: u64,
    pub requests_unanswered: u64,
    pub transfers_sent: u64,
    pub transfers_staged: u64,
    pub duplicates_discarded: u64,
    pub resources_applied: u64,
    pub apply_failures: u64,
    pub releases_sent: u64,
    pub releases_applied: u64,
    pub protocol_violations: u64,
    pub acknowledgements: u64,
    pub user_messages_received: u64,
}

macro_rules! counters {
    ($($field:ident => $bump:ident),* $(,)?) => {
        impl SyncStats {
            $(
                #[inline]
                pub(crate) fn $bump(&self, n: u64) {
                    self.$field.fetch_add(n, Ordering::Relaxed);
                }
            )*

            #[must_use]
            pub fn snapshot(&self) -> SyncStatsSnapshot {
                SyncStatsSnapshot {
                    $($field: self.$field.load(Ordering::Relaxed),)*
                }
            }
        }
    };
}

counters! {
    requests_sent => add_requests_sent,
    requests_served => add_requests_served,
    requests_unanswered => add_requests_unanswered,
    transfers_sent => add_transfers_sent,
    transfers_staged => add_transfers_staged,
    duplicates_discarded => add_duplicates_discarded,
    resources_applied => add_resources_applied,
    apply_failures => add_apply_failures,
    releases_sent => add_releases_sent,
    releases_applied => add_releases_applied,
    protocol_violations => add_protocol_violations,
    acknowledgements => add_acknowledgements,
    user_messages_received => add_user_messages_received,
}
