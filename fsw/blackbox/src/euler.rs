//! Quaternion to Euler angle post-pass.
//!
//! When a log contains an `IMU` group whose orientation is stored as a unit
//! quaternion `q1..q4` (scalar first, NED frame), the four quaternion columns
//! are replaced by three columns of roll/pitch/yaw in degrees. The column
//! following the third angle is removed from the headers and from every row.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{Error, EulerError, IoError};
use crate::table::Table;

pub const IMU_GROUP: &str = "IMU";
pub const QUATERNION_LABEL: &str = "q1 [NED]";
pub const EULER_LABELS: [&str; 3] = ["phi [deg]", "theta [deg]", "psi [deg]"];

/// What the pass did to a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EulerOutcome {
    /// No `IMU` group, the table is untouched.
    NoImu,
    /// The quaternion at `quat_pos` was rewritten in `rows` data rows.
    Converted { quat_pos: usize, rows: usize },
}

/// Converts a quaternion `(w, x, y, z)` into 3-2-1 Euler angles
/// `(phi, theta, psi)` in degrees.
///
/// See: https://en.wikipedia.org/wiki/Conversion_between_quaternions_and_Euler_angles
pub fn quat_to_euler_deg(q1: f64, q2: f64, q3: f64, q4: f64) -> (f64, f64, f64) {
    let phi = (2.0 * (q1 * q2 + q3 * q4)).atan2(1.0 - 2.0 * (q2 * q2 + q3 * q3));

    let sinp = (1.0 + 2.0 * (q1 * q3 - q2 * q4)).sqrt();
    let cosp = (1.0 - 2.0 * (q1 * q3 - q2 * q4)).sqrt();
    let theta = 2.0 * sinp.atan2(cosp) - std::f64::consts::FRAC_PI_2;

    let psi = (2.0 * (q1 * q4 + q2 * q3)).atan2(1.0 - 2.0 * (q3 * q3 + q4 * q4));

    (phi.to_degrees(), theta.to_degrees(), psi.to_degrees())
}

/// Rewrites the quaternion block of `table` in place.
///
/// Rows whose `q1` cell is empty belong to other sensors; they are only
/// narrowed so they stay aligned with the header.
pub fn apply(table: &mut Table) -> Result<EulerOutcome, EulerError> {
    if !table.groups.iter().any(|g| g == IMU_GROUP) {
        return Ok(EulerOutcome::NoImu);
    }
    let quat_pos = table
        .labels
        .iter()
        .position(|l| l == QUATERNION_LABEL)
        .ok_or_else(|| EulerError::MissingQuatPos {
            label: QUATERNION_LABEL.to_string(),
        })?;
    let removed = quat_pos + 3;
    if removed >= table.labels.len() {
        return Err(EulerError::IncompleteQuaternion { quat_pos });
    }

    let mut converted = 0;
    for (i, row) in table.rows.iter_mut().enumerate() {
        let has_quaternion = row.get(quat_pos).is_some_and(|cell| !cell.is_empty());
        if has_quaternion {
            let mut q = [0.0; 4];
            for (k, q) in q.iter_mut().enumerate() {
                let cell = row.get(quat_pos + k).map(String::as_str).unwrap_or_default();
                *q = cell
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| EulerError::InvalidQuaternion {
                        row: i,
                        value: cell.to_string(),
                    })?;
            }
            let (phi, theta, psi) = quat_to_euler_deg(q[0], q[1], q[2], q[3]);
            row[quat_pos] = phi.to_string();
            row[quat_pos + 1] = theta.to_string();
            row[quat_pos + 2] = psi.to_string();
            converted += 1;
        }
        if removed < row.len() {
            row.remove(removed);
        }
    }

    for (label, euler) in table.labels[quat_pos..].iter_mut().zip(EULER_LABELS) {
        *label = euler.to_string();
    }
    table.labels.remove(removed);
    if removed < table.groups.len() {
        table.groups.remove(removed);
    }

    Ok(EulerOutcome::Converted {
        quat_pos,
        rows: converted,
    })
}

/// Applies the pass to a CSV file on disk.
///
/// The rewritten CSV is written to `output` and `input` is deleted afterwards.
/// When the file has no `IMU` group it is moved to `output` unchanged.
/// `input` and `output` may be the same path, in which case the file is
/// rewritten in place.
pub fn rewrite_file(
    input: &Path,
    output: &Path,
    separator: u8,
) -> Result<EulerOutcome, Error> {
    let mut table = Table::load(input, separator)?;

    let outcome = apply(&mut table)?;
    let same_file = input == output;
    match outcome {
        EulerOutcome::NoImu => {
            if !same_file {
                fs::rename(input, output).map_err(|source| IoError::WriteFailed {
                    path: output.to_path_buf(),
                    source,
                })?;
            }
        }
        EulerOutcome::Converted { .. } => {
            table.save(output, separator)?;
            if !same_file {
                fs::remove_file(input).map_err(|source| IoError::RemoveFailed {
                    path: input.to_path_buf(),
                    source,
                })?;
            }
        }
    }
    info!(?input, ?output, ?outcome, "euler pass finished");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn imu_table() -> Table {
        Table {
            groups: ["time", "GPS", "IMU", "", "", "", "BARO"]
                .map(String::from)
                .to_vec(),
            labels: [
                "time [ms]",
                "fix [-]",
                "q1 [NED]",
                "q2 [NED]",
                "q3 [NED]",
                "q4 [NED]",
                "p [Pa]",
            ]
            .map(String::from)
            .to_vec(),
            rows: vec![
                vec!["1".into(), "3".into()],
                vec!["2".into(), "".into(), "1".into(), "0".into(), "0".into(), "0".into()],
                vec![
                    "3".into(),
                    "".into(),
                    "".into(),
                    "".into(),
                    "".into(),
                    "".into(),
                    "101325".into(),
                ],
            ],
        }
    }

    #[test]
    fn test_identity_is_zero() {
        let (phi, theta, psi) = quat_to_euler_deg(1.0, 0.0, 0.0, 0.0);
        assert_eq!((phi, theta, psi), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_single_axis_rotations() {
        let half = std::f64::consts::FRAC_PI_4;
        let (phi, theta, psi) = quat_to_euler_deg(half.cos(), half.sin(), 0.0, 0.0);
        assert_abs_diff_eq!(phi, 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(theta, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(psi, 0.0, epsilon = 1e-9);

        let (phi, theta, psi) = quat_to_euler_deg(half.cos(), 0.0, 0.0, half.sin());
        assert_abs_diff_eq!(phi, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(theta, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(psi, 90.0, epsilon = 1e-9);

        let eighth = std::f64::consts::PI / 8.0;
        let (phi, theta, psi) = quat_to_euler_deg(eighth.cos(), 0.0, eighth.sin(), 0.0);
        assert_abs_diff_eq!(phi, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(theta, 45.0, epsilon = 1e-6);
        assert_abs_diff_eq!(psi, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_apply_rewrites_block() {
        let mut table = imu_table();
        let outcome = apply(&mut table).unwrap();
        assert_eq!(
            outcome,
            EulerOutcome::Converted {
                quat_pos: 2,
                rows: 1
            }
        );
        assert_eq!(table.groups, ["time", "GPS", "IMU", "", "", "BARO"]);
        assert_eq!(
            table.labels,
            [
                "time [ms]",
                "fix [-]",
                "phi [deg]",
                "theta [deg]",
                "psi [deg]",
                "p [Pa]"
            ]
        );
        assert_eq!(table.rows[0], ["1", "3"]);
        assert_eq!(table.rows[1], ["2", "", "0", "0", "0"]);
        assert_eq!(table.rows[2], ["3", "", "", "", "", "101325"]);
    }

    #[test]
    fn test_no_imu_is_untouched() {
        let mut table = imu_table();
        table.groups[2] = "ATT".to_string();
        let before = table.clone();
        assert_eq!(apply(&mut table).unwrap(), EulerOutcome::NoImu);
        assert_eq!(table, before);
    }

    #[test]
    fn test_missing_quaternion_label() {
        let mut table = imu_table();
        table.labels[2] = "q1 [ENU]".to_string();
        assert_eq!(
            apply(&mut table),
            Err(EulerError::MissingQuatPos {
                label: QUATERNION_LABEL.to_string()
            })
        );
    }

    #[test]
    fn test_incomplete_quaternion() {
        let mut table = imu_table();
        table.labels.truncate(4);
        assert_eq!(
            apply(&mut table),
            Err(EulerError::IncompleteQuaternion { quat_pos: 2 })
        );
    }

    #[test]
    fn test_invalid_quaternion_cell() {
        let mut table = imu_table();
        table.rows[1][4] = "nope".to_string();
        assert_eq!(
            apply(&mut table),
            Err(EulerError::InvalidQuaternion {
                row: 1,
                value: "nope".to_string()
            })
        );
    }

    #[test]
    fn test_rewrite_file_stages_through_intermediate() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("log_tmp.csv");
        let out = dir.path().join("log.csv");
        fs::write(
            &tmp,
            "time;IMU;;;\ntime [ms];q1 [NED];q2 [NED];q3 [NED];q4 [NED]\n5;1;0;0;0\n",
        )
        .unwrap();
        let outcome = rewrite_file(&tmp, &out, b';').unwrap();
        assert!(matches!(outcome, EulerOutcome::Converted { quat_pos: 1, rows: 1 }));
        assert!(!tmp.exists());
        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            "time;IMU;;\ntime [ms];phi [deg];theta [deg];psi [deg]\n5;0;0;0\n"
        );
    }

    #[test]
    fn test_rewrite_file_without_imu_moves_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("log_tmp.csv");
        let out = dir.path().join("log.csv");
        let content = "time;GPS\ntime [ms];fix [-]\n5;\"a;b\"\n";
        fs::write(&tmp, content).unwrap();
        assert_eq!(rewrite_file(&tmp, &out, b';').unwrap(), EulerOutcome::NoImu);
        assert!(!tmp.exists());
        assert_eq!(fs::read_to_string(&out).unwrap(), content);
    }
}
