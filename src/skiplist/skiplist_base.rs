use std::{marker::PhantomData, ptr::NonNull};

/// Максимальный уровень пропускного списка.
pub(crate) const MAX_LEVEL: usize = 16;

/// Вероятностный коэффициент для определения уровня нового узла.
const P: u32 = 0x4000;
const MASK: u32 = 0xFFFF;

pub(crate) type Link<M> = Option<NonNull<Node<M>>>;

/// Узел пропускного списка: участник с числовым счётом.
///
/// `span[i]` — сколько шагов нулевого уровня отделяет узел от его
/// преемника на уровне `i`; на этих расстояниях держится ранговая
/// арифметика.
#[derive(Debug)]
pub(crate) struct Node<M> {
    pub(crate) member: M,
    pub(crate) score: f64,
    pub(crate) backward: Link<M>,
    pub(crate) level: usize,
    pub(crate) forward: [Link<M>; MAX_LEVEL],
    pub(crate) span: [usize; MAX_LEVEL],
}

/// Диапазон по счёту с независимо исключаемыми границами.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeSpec {
    pub min: f64,
    pub max: f64,
    pub minex: bool,
    pub maxex: bool,
}

/// Упорядоченная структура `(участник, счёт)` с отслеживанием рангов.
///
/// Порядок — по счёту, при равных счётах по участнику. Пара
/// `(участник, счёт)` уникальна. Ранги 1-базные и поддерживаются
/// расстояниями `span` на всех уровнях, поэтому `rank` и
/// `element_by_rank` стоят O(log n).
#[derive(Debug)]
pub struct SkipList<M> {
    pub(crate) head: NonNull<Node<M>>,
    pub(crate) tail: Link<M>,
    pub(crate) level: usize,
    pub(crate) length: usize,
}

/// Итератор по узлам списка в прямом порядке.
pub struct SkipListIter<'a, M> {
    current: Link<M>,
    _marker: PhantomData<&'a Node<M>>,
}

/// Итератор по узлам списка в обратном порядке.
pub struct ReverseIter<'a, M> {
    current: Link<M>,
    _marker: PhantomData<&'a Node<M>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<M> Node<M> {
    /// Создаёт новый узел с заданным уровнем.
    fn new(
        member: M,
        score: f64,
        level: usize,
    ) -> Box<Self> {
        Box::new(Node {
            member,
            score,
            backward: None,
            level,
            forward: [None; MAX_LEVEL],
            span: [0; MAX_LEVEL],
        })
    }
}

impl RangeSpec {
    /// Диапазон с включёнными границами.
    pub fn inclusive(
        min: f64,
        max: f64,
    ) -> Self {
        RangeSpec {
            min,
            max,
            minex: false,
            maxex: false,
        }
    }

    /// Проверяет счёт против нижней границы.
    #[inline]
    pub fn gte_min(
        &self,
        score: f64,
    ) -> bool {
        if self.minex {
            score > self.min
        } else {
            score >= self.min
        }
    }

    /// Проверяет счёт против верхней границы.
    #[inline]
    pub fn lte_max(
        &self,
        score: f64,
    ) -> bool {
        if self.maxex {
            score < self.max
        } else {
            score <= self.max
        }
    }
}

impl<M> SkipList<M>
where
    M: Ord + Default,
{
    /// Создаёт новый пустой список.
    pub fn new() -> Self {
        let head = Node::new(M::default(), 0.0, MAX_LEVEL);

        Self {
            head: unsafe { NonNull::new_unchecked(Box::into_raw(head)) },
            tail: None,
            level: 1,
            length: 0,
        }
    }

    /// Возвращает количество элементов.
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Проверяет, пуст ли список.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Генерирует случайный уровень для нового узла.
    #[inline(always)]
    fn random_level() -> usize {
        let mut lvl = 1;

        while lvl < MAX_LEVEL && (fastrand::u32(..) & MASK) < P {
            lvl += 1;
        }

        lvl
    }

    /// Вставляет пару `(member, score)` с сохранением порядка.
    ///
    /// Возвращает `false`, если такая пара уже есть. NaN в качестве счёта —
    /// нарушение контракта вызывающего.
    pub fn insert(
        &mut self,
        member: M,
        score: f64,
    ) -> bool {
        assert!(!score.is_nan(), "NaN is not an ordering key");

        unsafe {
            let mut update: [*mut Node<M>; MAX_LEVEL] = [self.head.as_ptr(); MAX_LEVEL];
            let mut rank = [0usize; MAX_LEVEL];
            let mut x = self.head.as_ptr();

            for i in (0..self.level).rev() {
                rank[i] = if i == self.level - 1 { 0 } else { rank[i + 1] };
                while let Some(next) = (*x).forward[i] {
                    let n = next.as_ptr();
                    if (*n).score < score || ((*n).score == score && (*n).member < member) {
                        rank[i] += (*x).span[i];
                        x = n;
                    } else {
                        break;
                    }
                }
                update[i] = x;
            }

            // Пара (score, member) должна быть уникальной.
            if let Some(next) = (*update[0]).forward[0] {
                let n = next.as_ptr();
                if (*n).score == score && (*n).member == member {
                    return false;
                }
            }

            let lvl = Self::random_level();
            if lvl > self.level {
                for i in self.level..lvl {
                    rank[i] = 0;
                    update[i] = self.head.as_ptr();
                    (*update[i]).span[i] = self.length;
                }
                self.level = lvl;
            }

            let node = Box::into_raw(Node::new(member, score, lvl));
            for i in 0..lvl {
                (*node).forward[i] = (*update[i]).forward[i];
                (*update[i]).forward[i] = Some(NonNull::new_unchecked(node));

                (*node).span[i] = (*update[i]).span[i] - (rank[0] - rank[i]);
                (*update[i]).span[i] = (rank[0] - rank[i]) + 1;
            }
            for i in lvl..self.level {
                (*update[i]).span[i] += 1;
            }

            (*node).backward = if update[0] == self.head.as_ptr() {
                None
            } else {
                Some(NonNull::new_unchecked(update[0]))
            };
            if let Some(next) = (*node).forward[0] {
                (*next.as_ptr()).backward = Some(NonNull::new_unchecked(node));
            } else {
                self.tail = Some(NonNull::new_unchecked(node));
            }

            self.length += 1;
            true
        }
    }

    /// Удаляет пару `(member, score)`. Возвращает `true` при успехе.
    pub fn delete(
        &mut self,
        member: &M,
        score: f64,
    ) -> bool {
        unsafe {
            let mut update: [*mut Node<M>; MAX_LEVEL] = [self.head.as_ptr(); MAX_LEVEL];
            let mut x = self.head.as_ptr();

            for i in (0..self.level).rev() {
                while let Some(next) = (*x).forward[i] {
                    let n = next.as_ptr();
                    if (*n).score < score || ((*n).score == score && (*n).member < *member) {
                        x = n;
                    } else {
                        break;
                    }
                }
                update[i] = x;
            }

            match (*update[0]).forward[0] {
                Some(t) if (*t.as_ptr()).score == score && (*t.as_ptr()).member == *member => {
                    self.unlink(t.as_ptr(), &update);
                    drop(Box::from_raw(t.as_ptr()));
                    true
                }
                _ => false,
            }
        }
    }

    /// Исключает узел из всех уровней с поправкой спанов.
    unsafe fn unlink(
        &mut self,
        x: *mut Node<M>,
        update: &[*mut Node<M>; MAX_LEVEL],
    ) {
        for i in 0..self.level {
            if (*update[i]).forward[i] == Some(NonNull::new_unchecked(x)) {
                (*update[i]).span[i] += (*x).span[i];
                (*update[i]).span[i] -= 1;
                (*update[i]).forward[i] = (*x).forward[i];
            } else {
                (*update[i]).span[i] -= 1;
            }
        }

        if let Some(next) = (*x).forward[0] {
            (*next.as_ptr()).backward = (*x).backward;
        } else {
            self.tail = (*x).backward;
        }

        while self.level > 1 && (*self.head.as_ptr()).forward[self.level - 1].is_none() {
            (*self.head.as_ptr()).span[self.level - 1] = 0;
            self.level -= 1;
        }
        self.length -= 1;
    }

    /// Возвращает 1-базный ранг пары или `None`, если её нет.
    pub fn rank(
        &self,
        member: &M,
        score: f64,
    ) -> Option<usize> {
        unsafe {
            let mut rank = 0usize;
            let mut x = self.head.as_ptr();

            for i in (0..self.level).rev() {
                while let Some(next) = (*x).forward[i] {
                    let n = next.as_ptr();
                    if (*n).score < score || ((*n).score == score && (*n).member <= *member) {
                        rank += (*x).span[i];
                        x = n;
                    } else {
                        break;
                    }
                }
                if x != self.head.as_ptr() && (*x).score == score && (*x).member == *member {
                    return Some(rank);
                }
            }
            None
        }
    }

    /// Возвращает элемент по 1-базному рангу.
    pub fn element_by_rank(
        &self,
        rank: usize,
    ) -> Option<(&M, f64)> {
        if rank == 0 || rank > self.length {
            return None;
        }

        unsafe {
            let mut traversed = 0usize;
            let mut x = self.head.as_ptr();

            for i in (0..self.level).rev() {
                while let Some(next) = (*x).forward[i] {
                    if traversed + (*x).span[i] <= rank {
                        traversed += (*x).span[i];
                        x = next.as_ptr();
                    } else {
                        break;
                    }
                }
                if traversed == rank {
                    return Some((&(*x).member, (*x).score));
                }
            }
            None
        }
    }

    /// Проверяет, пересекается ли список с диапазоном.
    pub fn is_in_range(
        &self,
        range: &RangeSpec,
    ) -> bool {
        // Пустой или вырожденный диапазон.
        if range.min > range.max || (range.min == range.max && (range.minex || range.maxex)) {
            return false;
        }

        unsafe {
            let Some(tail) = self.tail else {
                return false;
            };
            if !range.gte_min((*tail.as_ptr()).score) {
                return false;
            }

            let Some(first) = (*self.head.as_ptr()).forward[0] else {
                return false;
            };
            if !range.lte_max((*first.as_ptr()).score) {
                return false;
            }
            true
        }
    }

    /// Первый элемент, попадающий в диапазон.
    pub fn first_in_range(
        &self,
        range: &RangeSpec,
    ) -> Option<(&M, f64)> {
        if !self.is_in_range(range) {
            return None;
        }

        unsafe {
            let mut x = self.head.as_ptr();
            for i in (0..self.level).rev() {
                while let Some(next) = (*x).forward[i] {
                    if !range.gte_min((*next.as_ptr()).score) {
                        x = next.as_ptr();
                    } else {
                        break;
                    }
                }
            }

            // is_in_range гарантирует преемника.
            let n = (*x).forward[0].expect("non-empty range").as_ptr();
            if !range.lte_max((*n).score) {
                return None;
            }
            Some((&(*n).member, (*n).score))
        }
    }

    /// Последний элемент, попадающий в диапазон.
    pub fn last_in_range(
        &self,
        range: &RangeSpec,
    ) -> Option<(&M, f64)> {
        if !self.is_in_range(range) {
            return None;
        }

        unsafe {
            let mut x = self.head.as_ptr();
            for i in (0..self.level).rev() {
                while let Some(next) = (*x).forward[i] {
                    if range.lte_max((*next.as_ptr()).score) {
                        x = next.as_ptr();
                    } else {
                        break;
                    }
                }
            }

            if x == self.head.as_ptr() || !range.gte_min((*x).score) {
                return None;
            }
            Some((&(*x).member, (*x).score))
        }
    }

    /// Очищает список, освобождая все узлы.
    pub fn clear(&mut self) {
        unsafe {
            let mut cur = (*self.head.as_ptr()).forward[0];
            while let Some(node) = cur {
                let boxed = Box::from_raw(node.as_ptr());
                cur = boxed.forward[0];
            }

            let head = self.head.as_ptr();
            (*head).forward = [None; MAX_LEVEL];
            (*head).span = [0; MAX_LEVEL];
            (*head).backward = None;
        }
        self.tail = None;
        self.level = 1;
        self.length = 0;
    }

    /// Возвращает итератор в порядке возрастания `(score, member)`.
    pub fn iter(&self) -> SkipListIter<'_, M> {
        SkipListIter {
            current: unsafe { (*self.head.as_ptr()).forward[0] },
            _marker: PhantomData,
        }
    }

    /// Возвращает итератор в порядке убывания.
    pub fn rev_iter(&self) -> ReverseIter<'_, M> {
        ReverseIter {
            current: self.tail,
            _marker: PhantomData,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl<'a, M> Iterator for SkipListIter<'a, M> {
    type Item = (&'a M, f64);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;
        unsafe {
            let n = node.as_ptr();
            self.current = (*n).forward[0];
            Some((&(*n).member, (*n).score))
        }
    }
}

impl<'a, M> Iterator for ReverseIter<'a, M> {
    type Item = (&'a M, f64);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;
        unsafe {
            let n = node.as_ptr();
            self.current = (*n).backward;
            Some((&(*n).member, (*n).score))
        }
    }
}

impl<M> Default for SkipList<M>
where
    M: Ord + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Drop for SkipList<M> {
    fn drop(&mut self) {
        unsafe {
            let mut cur = (*self.head.as_ptr()).forward[0];
            while let Some(node) = cur {
                let boxed = Box::from_raw(node.as_ptr());
                cur = boxed.forward[0];
            }
            drop(Box::from_raw(self.head.as_ptr()));
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет вставку, поиск ранга и удаление.
    #[test]
    fn insert_rank_delete() {
        let mut list: SkipList<String> = SkipList::new();
        assert!(list.insert("wzp".into(), 3.0));
        assert!(list.insert("xz".into(), 1.0));
        assert!(list.insert("ms".into(), 2.0));
        assert_eq!(list.len(), 3);

        assert_eq!(list.rank(&"xz".into(), 1.0), Some(1));
        assert_eq!(list.rank(&"ms".into(), 2.0), Some(2));
        assert_eq!(list.rank(&"wzp".into(), 3.0), Some(3));
        assert_eq!(list.rank(&"nope".into(), 5.0), None);

        assert!(list.delete(&"ms".into(), 2.0));
        assert!(!list.delete(&"ms".into(), 2.0));
        assert_eq!(list.rank(&"wzp".into(), 3.0), Some(2));
        assert_eq!(list.len(), 2);
    }

    /// Тест проверяет отказ от дубликата пары (участник, счёт) и
    /// допустимость одинаковых счётов у разных участников.
    #[test]
    fn duplicate_pair_rejected() {
        let mut list: SkipList<String> = SkipList::new();
        assert!(list.insert("a".into(), 1.0));
        assert!(!list.insert("a".into(), 1.0));
        assert!(list.insert("b".into(), 1.0));
        assert!(list.insert("a".into(), 2.0));
        assert_eq!(list.len(), 3);
    }

    /// Тест проверяет порядок обхода и обратный итератор.
    #[test]
    fn iteration_order() {
        let mut list: SkipList<u64> = SkipList::new();
        for v in [5u64, 1, 4, 2, 3] {
            list.insert(v, v as f64);
        }

        let forward: Vec<u64> = list.iter().map(|(m, _)| *m).collect();
        assert_eq!(forward, vec![1, 2, 3, 4, 5]);

        let backward: Vec<u64> = list.rev_iter().map(|(m, _)| *m).collect();
        assert_eq!(backward, vec![5, 4, 3, 2, 1]);
    }

    /// Тест проверяет выбор элементов по рангу.
    #[test]
    fn element_by_rank_matches_order() {
        let mut list: SkipList<u64> = SkipList::new();
        for v in 1..=100u64 {
            list.insert(v, v as f64);
        }
        assert_eq!(list.element_by_rank(0), None);
        assert_eq!(list.element_by_rank(101), None);
        for r in 1..=100usize {
            let (m, s) = list.element_by_rank(r).unwrap();
            assert_eq!(*m, r as u64);
            assert_eq!(s, r as f64);
        }
    }

    /// Тест проверяет диапазонные запросы с исключёнными границами.
    #[test]
    fn range_queries() {
        let mut list: SkipList<String> = SkipList::new();
        for (m, s) in [("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)] {
            list.insert(m.into(), s);
        }

        let range = RangeSpec::inclusive(2.0, 3.0);
        assert!(list.is_in_range(&range));
        assert_eq!(list.first_in_range(&range).unwrap().1, 2.0);
        assert_eq!(list.last_in_range(&range).unwrap().1, 3.0);

        let exclusive = RangeSpec {
            min: 2.0,
            max: 4.0,
            minex: true,
            maxex: true,
        };
        assert_eq!(list.first_in_range(&exclusive).unwrap().1, 3.0);
        assert_eq!(list.last_in_range(&exclusive).unwrap().1, 3.0);

        let empty = RangeSpec::inclusive(10.0, 20.0);
        assert!(!list.is_in_range(&empty));
        assert_eq!(list.first_in_range(&empty), None);
    }

    /// Тест проверяет повторное использование после очистки.
    #[test]
    fn clear_and_reuse() {
        let mut list: SkipList<u64> = SkipList::new();
        for v in 0..50u64 {
            list.insert(v, v as f64);
        }
        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.iter().count(), 0);
        assert!(list.insert(7, 7.0));
        assert_eq!(list.rank(&7, 7.0), Some(1));
    }
}
