//! Object store path layout (§3 "Storage path"):
//! `data/YYYY/MM/NET/<grouping>/STA/LOC/CHA/<chunk-or-index-file>`.

use crate::model::{blob_name, ChunkMeta, Day, StationId};

fn directory(sid: &StationId, day: &Day, grouping: Option<&str>) -> String {
    format!(
        "data/{:04}/{:02}/{}/{}/{}/{}/{}",
        day.year(),
        day.month(),
        sid.network,
        sid.grouping(grouping),
        sid.station,
        sid.location,
        sid.channel,
    )
}

pub fn chunk_path(sid: &StationId, sample_rate: f64, day: &Day, chunk: &ChunkMeta, grouping: Option<&str>) -> String {
    format!("{}/{}", directory(sid, day, grouping), blob_name(sid, sample_rate, day, chunk))
}

pub fn day_index_path(sid: &StationId, day: &Day, grouping: Option<&str>) -> String {
    format!("{}/day-index-{}.json", directory(sid, day, grouping), day.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChunkStats;

    #[test]
    fn day_index_path_matches_layout() {
        let sid = StationId::new("HV", "NPOC", "01", "HHZ");
        let day = Day::parse("2025-10-24").unwrap();
        let path = day_index_path(&sid, &day, None);
        assert_eq!(path, "data/2025/10/HV/npoc/NPOC/01/HHZ/day-index-2025-10-24.json");
    }

    #[test]
    fn chunk_path_embeds_blob_name() {
        let sid = StationId::new("HV", "NPOC", "01", "HHZ");
        let day = Day::parse("2025-10-24").unwrap();
        let chunk = ChunkMeta {
            start: "00:00:00".into(),
            end: "00:10:00".into(),
            stats: ChunkStats {
                min: 0,
                max: 0,
                samples: 0,
                gap_count: 0,
                gap_duration_seconds: 0.0,
                gap_samples_filled: 0,
            },
            partial: false,
        };
        let path = chunk_path(&sid, 100.0, &day, &chunk, None);
        assert!(path.ends_with("HV_NPOC_01_HHZ_100Hz_2025-10-24-00-00-00_to_2025-10-24-00-10-00.bin.lz4"));
        assert!(path.starts_with("data/2025/10/HV/npoc/NPOC/01/HHZ/"));
    }
}
