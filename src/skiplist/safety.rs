use std::ptr::NonNull;

use thiserror::Error;

use super::skiplist_base::{SkipList, MAX_LEVEL};

/// Макрос для debug-time проверки инвариантов.
///
/// В release-сборках компилируется в no-op.
#[macro_export]
macro_rules! debug_assert_invariant {
    ($cond:expr, $($arg:tt)*) => {
        #[cfg(debug_assertions)]
        {
            if !$cond {
                panic!("Invariant violation: {}", format!($($arg)*));
            }
        }
    };
}

/// Макрос для валидации условий с возвратом ошибки.
#[macro_export]
macro_rules! validate {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
}

/// Нарушения внутренних инвариантов пропускного списка.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Уровень узла превышает максимальный.
    #[error("node level {node_level} exceeds maximum {max_level}")]
    InvalidLevel { node_level: usize, max_level: usize },

    /// Расстояние span не сходится с уровнем 0.
    #[error("span mismatch at level {level}: stored {stored}, walked {walked}")]
    SpanMismatch {
        level: usize,
        stored: usize,
        walked: usize,
    },

    /// Нарушен порядок сортировки.
    #[error("sort order violation: {message}")]
    SortOrderViolation { message: String },

    /// Длина списка не соответствует реальному количеству узлов.
    #[error("length mismatch: expected {expected}, actual {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Backward-ссылка указывает на неверный узел.
    #[error("invalid backward link: {message}")]
    InvalidBackwardLink { message: String },
}

/// Статистика структуры SkipList.
#[derive(Debug, Clone, PartialEq)]
pub struct SkipListStatistics {
    /// Количество узлов.
    pub node_count: usize,
    /// Распределение по уровням (индекс 0 — узлы уровня 1).
    pub level_distribution: Vec<usize>,
    /// Текущий максимальный уровень.
    pub current_max_level: usize,
    /// Максимально возможный уровень.
    pub max_possible_level: usize,
    /// Средний уровень узла.
    pub average_level: f64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<M> SkipList<M>
where
    M: Ord + Default,
{
    /// Полная проверка инвариантов: порядок, длина, backward-ссылки и
    /// сходимость спанов с уровнем 0.
    ///
    /// Дорогая операция, предназначена для тестов и диагностики.
    pub fn validate(&self) -> Result<(), ValidationError> {
        unsafe {
            let head = self.head.as_ptr();

            // Уровень 0: длина, сортировка, backward-ссылки.
            let mut count = 0usize;
            let mut prev: Option<*mut super::skiplist_base::Node<M>> = None;
            let mut cur = (*head).forward[0];

            while let Some(node) = cur {
                let n = node.as_ptr();
                validate!(
                    (*n).level >= 1 && (*n).level <= MAX_LEVEL,
                    ValidationError::InvalidLevel {
                        node_level: (*n).level,
                        max_level: MAX_LEVEL,
                    }
                );

                match prev {
                    Some(p) => {
                        let ordered = (*p).score < (*n).score
                            || ((*p).score == (*n).score && (*p).member < (*n).member);
                        validate!(
                            ordered,
                            ValidationError::SortOrderViolation {
                                message: format!(
                                    "scores {} and {} out of order",
                                    (*p).score,
                                    (*n).score
                                ),
                            }
                        );
                        validate!(
                            (*n).backward == Some(NonNull::new_unchecked(p)),
                            ValidationError::InvalidBackwardLink {
                                message: "backward does not point to predecessor".into(),
                            }
                        );
                    }
                    None => {
                        validate!(
                            (*n).backward.is_none(),
                            ValidationError::InvalidBackwardLink {
                                message: "first node has a backward link".into(),
                            }
                        );
                    }
                }

                prev = Some(n);
                count += 1;
                cur = (*n).forward[0];
            }

            validate!(
                count == self.length,
                ValidationError::LengthMismatch {
                    expected: self.length,
                    actual: count,
                }
            );

            // Каждый span обязан совпадать с числом шагов уровня 0 между
            // узлом и его преемником на данном уровне.
            for level in 0..self.level {
                let mut x = head;
                while let Some(next) = (*x).forward[level] {
                    let stored = (*x).span[level];
                    let mut walked = 0usize;
                    let mut y = x;
                    while y != next.as_ptr() {
                        match (*y).forward[0] {
                            Some(step) => {
                                y = step.as_ptr();
                                walked += 1;
                                if walked > self.length {
                                    break;
                                }
                            }
                            None => {
                                walked = self.length + 1;
                                break;
                            }
                        }
                    }
                    validate!(
                        walked == stored,
                        ValidationError::SpanMismatch {
                            level,
                            stored,
                            walked,
                        }
                    );
                    x = next.as_ptr();
                }
            }

            Ok(())
        }
    }

    /// Собирает статистику распределения уровней.
    pub fn statistics(&self) -> SkipListStatistics {
        let mut level_distribution = vec![0usize; MAX_LEVEL];
        let mut level_sum = 0usize;
        let mut node_count = 0usize;

        unsafe {
            let mut cur = (*self.head.as_ptr()).forward[0];
            while let Some(node) = cur {
                let n = node.as_ptr();
                level_distribution[(*n).level - 1] += 1;
                level_sum += (*n).level;
                node_count += 1;
                cur = (*n).forward[0];
            }
        }

        SkipListStatistics {
            node_count,
            level_distribution,
            current_max_level: self.level,
            max_possible_level: MAX_LEVEL,
            average_level: if node_count == 0 {
                0.0
            } else {
                level_sum as f64 / node_count as f64
            },
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет, что инварианты выполняются после смешанной
    /// нагрузки.
    #[test]
    fn invariants_hold_after_mixed_workload() {
        let mut list: SkipList<u64> = SkipList::new();
        assert_eq!(list.validate(), Ok(()));

        for v in 0..500u64 {
            list.insert(v, (v % 50) as f64);
        }
        assert_eq!(list.validate(), Ok(()));

        for v in (0..500u64).step_by(3) {
            assert!(list.delete(&v, (v % 50) as f64));
        }
        assert_eq!(list.validate(), Ok(()));
        assert_eq!(list.len(), list.iter().count());
    }

    /// Тест проверяет статистику уровней.
    #[test]
    fn statistics_are_consistent() {
        let mut list: SkipList<u64> = SkipList::new();
        for v in 0..200u64 {
            list.insert(v, v as f64);
        }

        let stats = list.statistics();
        assert_eq!(stats.node_count, 200);
        assert_eq!(stats.level_distribution.iter().sum::<usize>(), 200);
        assert!(stats.current_max_level <= stats.max_possible_level);
        assert!(stats.average_level >= 1.0);
    }

    /// Тест проверяет форматирование ошибок валидации.
    #[test]
    fn validation_error_display() {
        let err = ValidationError::LengthMismatch {
            expected: 10,
            actual: 7,
        };
        assert_eq!(err.to_string(), "length mismatch: expected 10, actual 7");
    }
}
