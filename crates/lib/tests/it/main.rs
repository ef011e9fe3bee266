/*! Integration tests for Tidemark.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the flows through the library:
 * - documents: creating, editing and materializing documents through the façade
 * - rebase: history compaction under the acknowledgment watermark
 * - sync_messages: outbound message emission and acknowledgment bookkeeping
 * - schema: stored schema versioning and drift rejection
 * - export: durable backup, restore, and file persistence
 */

mod documents;
mod export;
mod helpers;
mod rebase;
mod schema;
mod sync_messages;
