use crate::ids::EmployeeId;

/// One enrolled angle for one employee. Embeddings are unit-norm `f32`.
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub angle: String,
    pub embedding: Vec<f32>,
}

/// A company's gallery: a flat matrix of stacked embeddings plus metadata
/// aligned row-for-row, refreshed lazily by the recognizer
/// (`gallery_refresh_seconds`).
#[derive(Debug, Clone, Default)]
pub struct GalleryMatrix {
    dim: usize,
    rows: Vec<f32>,
    meta: Vec<(EmployeeId, String)>,
}

/// Result of matching one embedding against a [`GalleryMatrix`].
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryMatch {
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub score: f32,
    /// Best score among entries belonging to a *different* employee than the
    /// winner; used for the distinct-match margin check in the recognizer.
    pub best_other_score: f32,
}

impl GalleryMatrix {
    pub fn from_entries(entries: Vec<GalleryEntry>) -> Self {
        let dim = entries.first().map(|e| e.embedding.len()).unwrap_or(0);
        let mut rows = Vec::with_capacity(entries.len() * dim);
        let mut meta = Vec::with_capacity(entries.len());
        for entry in entries {
            debug_assert_eq!(entry.embedding.len(), dim, "ragged gallery embedding dims");
            rows.extend_from_slice(&entry.embedding);
            meta.push((entry.employee_id, entry.employee_name));
        }
        GalleryMatrix { dim, rows, meta }
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_empty()
    }

    pub fn len(&self) -> usize {
        self.meta.len()
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.rows[i * self.dim..(i + 1) * self.dim]
    }

    /// `match(emb) -> (argmax, max)`, deterministic for a fixed gallery and
    /// embedding: ties break toward the lowest row index.
    pub fn best_match(&self, embedding: &[f32]) -> Option<GalleryMatch> {
        if self.is_empty() {
            return None;
        }
        debug_assert_eq!(embedding.len(), self.dim);

        let mut best_i = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for i in 0..self.len() {
            let score = dot(self.row(i), embedding);
            if score > best_score {
                best_score = score;
                best_i = i;
            }
        }

        let winner_employee = &self.meta[best_i].0;
        let best_other_score = (0..self.len())
            .filter(|&i| &self.meta[i].0 != winner_employee)
            .map(|i| dot(self.row(i), embedding))
            .fold(f32::NEG_INFINITY, f32::max);

        Some(GalleryMatch {
            employee_id: winner_employee.clone(),
            employee_name: self.meta[best_i].1.clone(),
            score: best_score,
            best_other_score,
        })
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn entry(id: &str, name: &str, embedding: Vec<f32>) -> GalleryEntry {
        GalleryEntry {
            employee_id: EmployeeId::new(id),
            employee_name: name.to_string(),
            angle: "front".to_string(),
            embedding,
        }
    }

    #[test]
    fn match_is_deterministic_and_respects_distinct_margin() {
        let gallery = GalleryMatrix::from_entries(vec![
            entry("1", "Asif", vec![1.0, 0.0]),
            entry("2", "Bilal", vec![0.0, 1.0]),
        ]);
        let m = gallery.best_match(&[0.8, 0.2]).unwrap();
        assert_eq!(m.employee_id, EmployeeId::new("1"));
        assert_relative_eq!(m.score, 0.8);
        assert_relative_eq!(m.best_other_score, 0.2);
        assert!(m.score - m.best_other_score >= 0.5);
    }

    #[test]
    fn empty_gallery_has_no_match() {
        let gallery = GalleryMatrix::default();
        assert!(gallery.best_match(&[1.0, 0.0]).is_none());
    }
}
