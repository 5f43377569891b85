/*! Integration tests for Sharedoc.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - model: Paths, containers and plain snapshots through the handle API
 * - document: DocumentHandle lifecycle, local mutation and remote application
 * - events: EventBus delivery order, scopes, listener isolation and diagnostics
 * - concurrency: Two-replica exchanges, including a randomized convergence test
 * - participants: ParticipantRegistry membership and its events
 * - manager: HandleManager open/close lifecycle
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("sharedoc=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod concurrency;
mod document;
mod events;
mod helpers;
mod manager;
mod participants;
