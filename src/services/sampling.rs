use std::sync::atomic::{AtomicU64, Ordering};

use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};

use crate::{
    errors::{AppError, AppResult},
    models::domain::{AttemptQuestion, ObjectiveQuestion},
};

/// Supplies the seed for one attempt's sampling and shuffling.
pub trait SeedSource: Send + Sync {
    fn next_seed(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSeedSource;

impl SeedSource for RandomSeedSource {
    fn next_seed(&self) -> u64 {
        rand::thread_rng().gen()
    }
}

/// Hands out `seed`, `seed + 1`, ... so test runs are repeatable.
#[derive(Debug, Default)]
pub struct FixedSeedSource {
    next: AtomicU64,
}

impl FixedSeedSource {
    pub fn new(seed: u64) -> Self {
        Self {
            next: AtomicU64::new(seed),
        }
    }
}

impl SeedSource for FixedSeedSource {
    fn next_seed(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

/// Draws `count` questions without replacement, in random order, and shuffles
/// each question's options independently. Identical seeds give identical papers.
pub fn sample_questions(
    pool: &[ObjectiveQuestion],
    count: usize,
    seed: u64,
) -> AppResult<Vec<AttemptQuestion>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let amount = count.min(pool.len());
    if amount < count {
        log::warn!(
            "Question pool holds {} questions but {} were requested per student",
            pool.len(),
            count
        );
    }

    let mut picked = index::sample(&mut rng, pool.len(), amount).into_vec();
    picked.shuffle(&mut rng);

    picked
        .into_iter()
        .enumerate()
        .map(|(position, pool_index)| {
            let question = &pool[pool_index];
            let correct_answer = question
                .correct_answer()
                .ok_or_else(|| {
                    AppError::InternalError(format!(
                        "Question {} has no option at its correct index",
                        question.id
                    ))
                })?
                .to_string();

            let mut options = question.options.clone();
            options.shuffle(&mut rng);

            Ok(AttemptQuestion {
                question_id: question.id.clone(),
                shuffled_number: position as i32 + 1,
                original_number: question.question_number,
                question_text: question.question_text.clone(),
                options,
                selected_answer: None,
                student_score: None,
                score: question.score,
                correct_answer,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn pool(size: usize) -> Vec<ObjectiveQuestion> {
        (0..size)
            .map(|i| ObjectiveQuestion {
                id: format!("q{}", i),
                question_number: i as i32 + 1,
                question_text: format!("Question {}", i),
                options: vec![
                    format!("{}-a", i),
                    format!("{}-b", i),
                    format!("{}-c", i),
                    format!("{}-d", i),
                ],
                correct_option: (i % 4) as i32,
                score: 1,
            })
            .collect()
    }

    #[test]
    fn same_seed_gives_same_paper() {
        let questions = pool(30);
        let first = sample_questions(&questions, 10, 7).unwrap();
        let second = sample_questions(&questions, 10, 7).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn sampling_is_without_replacement_and_numbered() {
        let questions = pool(30);
        let paper = sample_questions(&questions, 10, 99).unwrap();

        assert_eq!(paper.len(), 10);
        let ids: HashSet<_> = paper.iter().map(|q| q.question_id.clone()).collect();
        assert_eq!(ids.len(), 10);
        let numbers: Vec<_> = paper.iter().map(|q| q.shuffled_number).collect();
        assert_eq!(numbers, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn shuffled_options_keep_the_correct_answer_text() {
        let questions = pool(12);
        let paper = sample_questions(&questions, 12, 3).unwrap();

        for item in &paper {
            let original = questions.iter().find(|q| q.id == item.question_id).unwrap();
            assert_eq!(Some(item.correct_answer.as_str()), original.correct_answer());
            let mut sorted = item.options.clone();
            sorted.sort();
            assert_eq!(sorted, original.options);
            assert!(item.selected_answer.is_none());
        }
    }

    #[test]
    fn small_pool_is_clamped() {
        let paper = sample_questions(&pool(3), 10, 1).unwrap();
        assert_eq!(paper.len(), 3);
    }

    #[test]
    fn fixed_seed_source_counts_up() {
        let seeds = FixedSeedSource::new(40);
        assert_eq!(seeds.next_seed(), 40);
        assert_eq!(seeds.next_seed(), 41);
    }
}
