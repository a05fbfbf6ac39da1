//! Minimal demo driving a `BufferManager` end to end, wired with the same
//! `tracing`-based logging setup the teacher crate uses for its own
//! binaries: a `tracing_subscriber` fmt layer, bridged from the `log`
//! facade the storage layer logs through.
use pagebufmgr::{BufferManager, StaticTable};

fn main() {
    tracing_subscriber::fmt::init();

    let dir = std::env::temp_dir().join("pagebufmgr-demo");
    std::fs::create_dir_all(&dir).expect("create demo dir");
    let temp_file = dir.join("scratch.tmp");
    let table = StaticTable::new("orders", dir.join("orders.db"));

    let bpm = BufferManager::try_new(4096, 8, temp_file).expect("construct buffer manager");

    let page = bpm.get_page(table.clone(), 0);
    {
        let mut bytes = page.get_bytes().expect("fetch page 0");
        bytes[..5].copy_from_slice(b"hello");
    }
    page.wrote_bytes();
    drop(page);

    let page = bpm.get_page(table, 0);
    let bytes = page.get_bytes().expect("re-fetch page 0");
    tracing::info!(contents = ?&bytes[..5], "read back page 0");
}
