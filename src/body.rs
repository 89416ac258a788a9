//! # Lagrangian body points
//!
//! Marker coordinates are replicated on every rank. Each point belongs to
//! the rank owning the cell row (last axis) that contains it, points
//! outside the domain go to the nearest rank. Global indices are ordered
//! by owning rank, the input order is kept within a rank.
use crate::config::BodyConfig;
use crate::error::{Error, Result};
use crate::mesh::Mesh;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Body points with their distribution
#[derive(Debug, Clone)]
pub struct BodyPoints<const N: usize> {
    /// Coordinates in global index order
    pub coords: Vec<[f64; N]>,
    counts: Vec<usize>,
    offsets: Vec<usize>,
}

impl<const N: usize> BodyPoints<N> {
    /// Assign points to ranks by mesh ownership and reorder them
    pub fn partition(mesh: &Mesh<N>, points: &[[f64; N]]) -> Self {
        let nprocs = mesh.nprocs();
        let last = &mesh.nodes[N - 1];
        let mut per_rank: Vec<Vec<[f64; N]>> = vec![Vec::new(); nprocs];
        for x in points {
            // cell row containing the point, clamped into the domain
            let j = last.partition_point(|&y| y <= x[N - 1]).clamp(1, mesh.n[N - 1]) - 1;
            let p = (0..nprocs).find(|&p| mesh.cell_rows_of(p).contains(&j)).unwrap_or(0);
            per_rank[p].push(*x);
        }
        let counts: Vec<usize> = per_rank.iter().map(Vec::len).collect();
        Self::from_parts(per_rank.concat(), counts)
    }

    /// Points already in global order with per-rank counts
    pub fn from_parts(coords: Vec<[f64; N]>, counts: Vec<usize>) -> Self {
        let mut offsets = vec![0];
        for c in &counts {
            offsets.push(offsets[offsets.len() - 1] + c);
        }
        Self { coords, counts, offsets }
    }

    /// No body
    pub fn empty(nprocs: usize) -> Self {
        Self::from_parts(Vec::new(), vec![0; nprocs])
    }

    /// Number of points per rank
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Total number of points
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// True if there are no points
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Global indices of the points of rank `p`
    pub fn range_of(&self, p: usize) -> std::ops::Range<usize> {
        self.offsets[p]..self.offsets[p + 1]
    }
}

/// Equally spaced points on a circle
pub fn circle(center: [f64; 2], radius: f64, npoints: usize) -> Vec<[f64; 2]> {
    (0..npoints)
        .map(|k| {
            let t = 2. * std::f64::consts::PI * k as f64 / npoints as f64;
            [center[0] + radius * t.cos(), center[1] + radius * t.sin()]
        })
        .collect()
}

/// Collect the points of all configured bodies
///
/// # Errors
/// Circle outside 2D, malformed centre or unreadable point file
pub fn points_from_config<const N: usize>(bodies: &[BodyConfig]) -> Result<Vec<[f64; N]>> {
    let mut points = Vec::new();
    for b in bodies {
        match b {
            BodyConfig::Circle {
                center,
                radius,
                points: npoints,
            } => {
                if N != 2 || center.len() != 2 {
                    return Err(Error::Config("circle bodies need a 2D mesh and centre".to_string()));
                }
                let c = circle([center[0], center[1]], *radius, *npoints);
                points.extend(c.iter().map(|x| std::array::from_fn(|a| x[a])));
            }
            BodyConfig::File { path } => points.extend(read_points::<N, _>(path)?),
        }
    }
    Ok(points)
}

/// Read points from an ascii file
///
/// One point per line, `x y` or `x y z`. A leading line with a single
/// integer is taken as the point count. Empty lines and lines starting
/// with `#` are skipped.
///
/// # Errors
/// File can not be read, malformed line or count mismatch
pub fn read_points<const N: usize, P: AsRef<Path>>(path: P) -> Result<Vec<[f64; N]>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut points = Vec::new();
    let mut expected = None;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        if points.is_empty() && expected.is_none() && words.len() == 1 {
            if let Ok(n) = words[0].parse::<usize>() {
                expected = Some(n);
                continue;
            }
        }
        if words.len() != N {
            return Err(Error::Config(format!(
                "{}:{}: expected {} coordinates",
                path.as_ref().display(),
                lineno + 1,
                N
            )));
        }
        let mut x = [0.; N];
        for (a, w) in words.iter().enumerate() {
            x[a] = w.parse().map_err(|_| {
                Error::Config(format!("{}:{}: invalid number {}", path.as_ref().display(), lineno + 1, w))
            })?;
        }
        points.push(x);
    }
    if let Some(n) = expected {
        if n != points.len() {
            return Err(Error::Config(format!(
                "{}: header announces {} points, found {}",
                path.as_ref().display(),
                n,
                points.len()
            )));
        }
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partition_by_rows() {
        let nodes = [vec![0., 1., 2.], vec![0., 1., 2., 3., 4.]];
        let mesh = Mesh::<2>::with_decomposition(nodes, 2, 0).unwrap();
        let points = [[0.5, 3.5], [0.5, 0.5], [1.5, -1.0], [1.5, 2.0], [1.0, 9.0]];
        let body = BodyPoints::partition(&mesh, &points);
        assert_eq!(body.counts(), &[2, 3]);
        assert_eq!(body.coords[0], [0.5, 0.5]);
        assert_eq!(body.coords[1], [1.5, -1.0]);
        assert_eq!(body.coords[2], [0.5, 3.5]);
        assert_eq!(body.range_of(1), 2..5);
    }

    #[test]
    fn test_circle() {
        let c = circle([1., 2.], 0.5, 8);
        assert_eq!(c.len(), 8);
        for x in &c {
            let r = ((x[0] - 1.).powi(2) + (x[1] - 2.).powi(2)).sqrt();
            assert!((r - 0.5).abs() < 1e-14);
        }
    }

    #[test]
    fn test_read_points() {
        let path = std::env::temp_dir().join("rustibm_test_points.txt");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "3\n0.0 0.1\n# comment\n0.2 0.3\n\n1e-1 -2").unwrap();
        let points: Vec<[f64; 2]> = read_points(&path).unwrap();
        assert_eq!(points, vec![[0.0, 0.1], [0.2, 0.3], [0.1, -2.0]]);
        assert!(read_points::<3, _>(&path).is_err());
        std::fs::remove_file(&path).unwrap();
    }
}
