use std::hash::{BuildHasher, Hash};

use super::dict_base::{chain_len, Dict};

/// Бюджет посещённых бакетов в `sample`: `count * SAMPLE_STEP_FACTOR`.
const SAMPLE_STEP_FACTOR: usize = 10;

/// Порог серии пустых бакетов, после которого обход перезапускается с
/// нового случайного индекса.
const SAMPLE_EMPTY_RUN_MIN: usize = 5;

impl<K, V, S> Dict<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Возвращает одну равномерно выбранную пару или `None` для пустого
    /// словаря.
    ///
    /// При активном рехешировании сначала переносится один бакет, затем
    /// индекс выбирается по объединённому остатку обоих поколений: бакеты
    /// ht[0] ниже курсора миграции уже пусты и не участвуют. Пустые бакеты
    /// перевыбираются, элемент в цепочке выбирается равномерно.
    pub fn random_entry(&mut self) -> Option<(&K, &V)> {
        if self.is_empty() {
            return None;
        }
        self.rehash_step_if_active();

        let (t, idx) = if self.is_rehashing() {
            let s0 = self.ht[0].buckets.len();
            let s1 = self.ht[1].buckets.len();
            let start = self.rehash_idx as usize;
            loop {
                let i = start + fastrand::usize(0..s0 + s1 - start);
                let (t, j) = if i >= s0 { (1, i - s0) } else { (0, i) };
                if self.ht[t].buckets[j].is_some() {
                    break (t, j);
                }
            }
        } else {
            let mask = self.ht[0].size_mask;
            loop {
                let i = fastrand::usize(..) & mask;
                if self.ht[0].buckets[i].is_some() {
                    break (0, i);
                }
            }
        };

        let chain = &self.ht[t].buckets[idx];
        let len = chain_len(chain);
        let mut node = chain.as_ref().unwrap();
        for _ in 0..fastrand::usize(0..len) {
            node = node.next.as_ref().unwrap();
        }
        Some((&node.key, &node.val))
    }

    /// Собирает до `count` пар, обходя подряд идущие бакеты от случайного
    /// индекса. Курсор не удерживается между вызовами.
    ///
    /// `count` ограничивается текущим размером; перед обходом выполняется
    /// до `count` шагов рехеширования. На обход даётся бюджет `count * 10`
    /// бакетов, серия пустых бакетов длиннее `max(5, count)` перезапускает
    /// обход с нового случайного индекса. Результат может быть короче
    /// `count` — это штатный исход, а не ошибка.
    ///
    /// Предназначено для обслуживания в стиле сканирования (например,
    /// отбора кандидатов на вытеснение), когда долгоживущий итератор
    /// нежелателен.
    pub fn sample(
        &mut self,
        count: usize,
    ) -> Vec<(&K, &V)> {
        let mut result = Vec::new();
        if self.is_empty() || count == 0 {
            return result;
        }
        let count = count.min(self.len());
        result.reserve(count);

        for _ in 0..count {
            if self.is_rehashing() {
                self.rehash_step_if_active();
            } else {
                break;
            }
        }

        let tables = if self.is_rehashing() { 2 } else { 1 };
        let mut maxmask = self.ht[0].size_mask;
        if tables == 2 && self.ht[1].size_mask > maxmask {
            maxmask = self.ht[1].size_mask;
        }

        let mut i = fastrand::usize(..) & maxmask;
        let mut empty_run = 0usize;
        let mut steps = count * SAMPLE_STEP_FACTOR;

        while result.len() < count && steps > 0 {
            steps -= 1;
            for t in 0..tables {
                if tables == 2 && t == 0 && (i as isize) < self.rehash_idx {
                    // Ниже курсора данных в ht[0] уже нет; если индекс к
                    // тому же вне ht[1], непустое место может быть только
                    // начиная с курсора.
                    if i >= self.ht[1].buckets.len() {
                        i = self.rehash_idx as usize;
                    } else {
                        continue;
                    }
                }
                if i >= self.ht[t].buckets.len() {
                    continue;
                }

                let mut node = self.ht[t].buckets[i].as_deref();
                if node.is_none() {
                    empty_run += 1;
                    if empty_run >= SAMPLE_EMPTY_RUN_MIN && empty_run > count {
                        i = fastrand::usize(..) & maxmask;
                        empty_run = 0;
                    }
                } else {
                    empty_run = 0;
                    while let Some(n) = node {
                        result.push((&n.key, &n.val));
                        if result.len() == count {
                            return result;
                        }
                        node = n.next.as_deref();
                    }
                }
            }
            i = (i + 1) & maxmask;
        }
        result
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
