// CSV export of a format's ranking table.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::valuation::ranking::{RankingRow, RANKING_COLUMNS};

/// Output file name for a format.
pub fn csv_file_name(format: &str) -> String {
    format!("rankings_{format}.csv")
}

/// Write `rows` to `<dir>/rankings_<format>.csv`.
///
/// Rows go to a temporary file in the same directory which is then renamed
/// over the target, so readers never observe a partially written table. The
/// header is written even when `rows` is empty.
pub fn write_rankings_csv(dir: &Path, format: &str, rows: &[RankingRow]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create export directory {}", dir.display()))?;

    let target = dir.join(csv_file_name(format));
    let temp = dir.join(format!(".{}.tmp", csv_file_name(format)));

    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&temp)
            .with_context(|| format!("failed to create {}", temp.display()))?;
        writer
            .write_record(RANKING_COLUMNS)
            .with_context(|| format!("failed to write header to {}", temp.display()))?;
        for row in rows {
            writer
                .serialize(row)
                .with_context(|| format!("failed to write row for {}", row.player_id))?;
        }
        writer
            .flush()
            .with_context(|| format!("failed to flush {}", temp.display()))?;
    }

    if let Err(e) = std::fs::rename(&temp, &target) {
        let _ = std::fs::remove_file(&temp);
        return Err(e).with_context(|| {
            format!(
                "failed to move {} into place at {}",
                temp.display(),
                target.display()
            )
        });
    }

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::player::PlayerId;

    fn row(id: &str, rank: u32) -> RankingRow {
        RankingRow {
            rank,
            player_id: PlayerId::new(id),
            name: format!("Player {id}"),
            team: "TST".into(),
            pos: "SP,RP".into(),
            pos_group: "SP".into(),
            family: "P".into(),
            playing_time: 150.0,
            avg: None,
            r: None,
            hr: None,
            rbi: None,
            sb: None,
            w: Some(11.0),
            sv: Some(0.0),
            k: Some(170.0),
            era: Some(3.4),
            whip: Some(1.12),
            sgp_r: None,
            sgp_hr: None,
            sgp_rbi: None,
            sgp_sb: None,
            sgp_avg: None,
            sgp_w: Some(2.0),
            sgp_sv: Some(0.0),
            sgp_k: Some(3.5),
            sgp_era: Some(1.1),
            sgp_whip: Some(0.9),
            sgp: 7.75,
            pool: Some("SP".into()),
            replacement_level: Some(2.0),
            sgpar: Some(5.75),
            value: 18.5,
            adp: None,
            min_pick: None,
            max_pick: None,
            rank_diff: None,
        }
    }

    #[test]
    fn writes_header_and_rows_then_replaces() {
        let dir = std::env::temp_dir().join("sgp_export_test");
        let _ = std::fs::remove_dir_all(&dir);

        let path = write_rankings_csv(&dir, "oc", &[row("a", 1), row("b", 2)]).unwrap();
        assert_eq!(path, dir.join("rankings_oc.csv"));

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("rank,player_id,name,team,pos,pos_group,family"));
        assert!(header.ends_with("value,adp,min_pick,max_pick,rank_diff"));
        assert_eq!(lines.count(), 2);
        assert!(text.contains("\"SP,RP\""));

        write_rankings_csv(&dir, "oc", &[row("c", 1)]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(!dir.join(".rankings_oc.csv.tmp").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_table_still_gets_header() {
        let dir = std::env::temp_dir().join("sgp_export_empty_test");
        let _ = std::fs::remove_dir_all(&dir);

        let path = write_rankings_csv(&dir, "oc", &[]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), vec![RANKING_COLUMNS.join(",")]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_replace_leaves_no_temp_file() {
        let dir = std::env::temp_dir().join("sgp_export_blocked_test");
        let _ = std::fs::remove_dir_all(&dir);
        // A directory squatting on the target name makes the rename fail.
        std::fs::create_dir_all(dir.join("rankings_oc.csv")).unwrap();

        assert!(write_rankings_csv(&dir, "oc", &[row("a", 1)]).is_err());
        assert!(!dir.join(".rankings_oc.csv.tmp").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
