// 🎲 Sampler - one draw proportional to weight

use rand::Rng;

use crate::weighting::WeightedStudent;

/// Walk the list subtracting weights from `r` and return the first entry
/// that brings the remainder to ≤ 0.
///
/// If float drift leaves the remainder positive, the last entry is returned.
/// Returns None only for an empty list.
pub fn pick_at(weighted: &[WeightedStudent], r: f64) -> Option<&WeightedStudent> {
    let mut remainder = r;

    for entry in weighted {
        remainder -= entry.weight;
        if remainder <= 0.0 {
            return Some(entry);
        }
    }

    weighted.last()
}

/// Draw one student with probability weight / total.
pub fn sample<'a, R: Rng>(
    weighted: &'a [WeightedStudent],
    rng: &mut R,
) -> Option<&'a WeightedStudent> {
    if weighted.is_empty() {
        return None;
    }

    let total: f64 = weighted.iter().map(|entry| entry.weight).sum();
    if !total.is_finite() || total <= 0.0 {
        return weighted.last();
    }

    let r = rng.random_range(0.0..total);
    pick_at(weighted, r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Student;
    use crate::weighting::compute_weights;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn weighted(weights: &[f64]) -> Vec<WeightedStudent> {
        weights
            .iter()
            .enumerate()
            .map(|(i, &weight)| WeightedStudent {
                student: Student::new(format!("Student {}", i)),
                weight,
            })
            .collect()
    }

    fn index_of(list: &[WeightedStudent], picked: &WeightedStudent) -> usize {
        list.iter()
            .position(|entry| entry.student.id == picked.student.id)
            .unwrap()
    }

    #[test]
    fn test_pick_at_walks_cumulative_weights() {
        let list = weighted(&[2.0, 1.0, 3.0]);

        assert_eq!(index_of(&list, pick_at(&list, 0.0).unwrap()), 0);
        assert_eq!(index_of(&list, pick_at(&list, 1.99).unwrap()), 0);
        assert_eq!(index_of(&list, pick_at(&list, 2.0).unwrap()), 0);
        assert_eq!(index_of(&list, pick_at(&list, 2.5).unwrap()), 1);
        assert_eq!(index_of(&list, pick_at(&list, 3.01).unwrap()), 2);
    }

    #[test]
    fn test_pick_at_falls_back_to_last() {
        let list = weighted(&[1.0, 1.0]);
        let picked = pick_at(&list, 2.0 + 1e-9).unwrap();
        assert_eq!(index_of(&list, picked), 1);
    }

    #[test]
    fn test_empty_input() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(sample(&[], &mut rng).is_none());
        assert!(pick_at(&[], 0.5).is_none());
    }

    #[test]
    fn test_single_student_always_drawn() {
        let list = weighted(&[1.0]);
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..100 {
            assert_eq!(index_of(&list, sample(&list, &mut rng).unwrap()), 0);
        }
    }

    #[test]
    fn test_equal_weights_are_roughly_uniform() {
        let students: Vec<Student> = ["A", "B", "C", "D"].iter().map(|n| Student::new(*n)).collect();
        let list = compute_weights(&students, Utc::now());
        assert!(list.iter().all(|entry| (entry.weight - 1.5).abs() < 1e-9));

        let mut rng = StdRng::seed_from_u64(42);
        let trials = 40_000;
        let mut counts = [0usize; 4];
        for _ in 0..trials {
            counts[index_of(&list, sample(&list, &mut rng).unwrap())] += 1;
        }

        for count in counts {
            let frequency = count as f64 / trials as f64;
            assert!((frequency - 0.25).abs() < 0.02, "frequency {} too far from 0.25", frequency);
        }
    }

    #[test]
    fn test_skewed_weights_favor_heavy_student() {
        let list = weighted(&[10.0, 1.0]);
        let mut rng = StdRng::seed_from_u64(2024);
        let trials = 22_000;

        let first = (0..trials)
            .filter(|_| index_of(&list, sample(&list, &mut rng).unwrap()) == 0)
            .count();

        let frequency = first as f64 / trials as f64;
        assert!((frequency - 10.0 / 11.0).abs() < 0.02, "frequency {}", frequency);
    }

    #[test]
    fn test_zero_total_falls_back_to_last() {
        let list = weighted(&[0.0, 0.0]);
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(index_of(&list, sample(&list, &mut rng).unwrap()), 1);
    }
}
