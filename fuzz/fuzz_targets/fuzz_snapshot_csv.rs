#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Accepted snapshots must survive a write/read cycle unchanged.
    if let Ok(rows) = afe_config::read_snapshot_csv(data) {
        let mut out = Vec::new();
        if afe_config::write_snapshot(&mut out, &rows).is_ok() {
            let again = afe_config::read_snapshot_csv(out.as_slice());
            assert_eq!(again.ok(), Some(rows));
        }
    }
});
