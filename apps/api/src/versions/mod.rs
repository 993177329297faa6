// Version history: bounded snapshot log of the live document.
// Snapshots are taken BEFORE any mutation overwrites the document.

pub mod handlers;
pub mod store;
