use tokio::{fs, time};
use crate::state::UploadLog;

/// Upload janitor: once the cumulative size of uploaded media passes the
/// cap, evict the oldest uploads until it fits again. Library files that
/// were not uploaded through the server are never touched.
pub async fn task(log: UploadLog, disk_cap: u64) {
    let mut tick = time::interval(time::Duration::from_secs(30));
    loop {
        tick.tick().await;
        let used: u64 = log.read().await.iter().map(|m| m.size).sum();
        if used <= disk_cap { continue; }

        tracing::info!(used, disk_cap, "upload cap exceeded, evicting oldest");
        let mut lg = log.write().await;
        let mut space = used;
        while space > disk_cap {
            if let Some(old) = lg.pop_front() {
                if fs::remove_file(&old.path).await.is_ok() {
                    space -= old.size;
                }
            } else { break; }
        }
    }
}
