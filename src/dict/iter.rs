use std::{
    hash::{BuildHasher, Hash, RandomState},
    marker::PhantomData,
};

use super::dict_base::{chain_len, Dict, DictNode, HashTable};

/// Итератор по словарю `Dict` (разделяемая ссылка).
///
/// Обходит оба поколения, пока идёт рехеширование. Заимствует словарь на
/// всё время обхода, поэтому никакая модификация параллельно невозможна.
pub struct DictIter<'a, K, V> {
    tables: [&'a HashTable<K, V>; 2],
    table_idx: usize,
    bucket_idx: usize,
    current_entry: Option<&'a DictNode<K, V>>,
}

/// Безопасный курсор: отсоединённый обходчик, приостанавливающий перенос
/// бакетов на время своей работы.
///
/// Курсор не заимствует словарь — каждая выборка получает его ссылкой:
///
/// ```
/// use kivi::Dict;
///
/// let mut d = Dict::new();
/// d.insert(String::from("a"), 1);
/// let mut cur = d.safe_cursor();
/// loop {
///     let key = match cur.next(&d) {
///         Some((k, _)) => k.clone(),
///         None => break,
///     };
///     // Между выборками словарь можно модифицировать.
///     d.remove(&key);
/// }
/// assert!(d.is_empty());
/// ```
///
/// С первой выборки и до освобождения структура поколений заморожена:
/// перенос бакетов и новые изменения размера не начинаются. Каждый ключ,
/// присутствующий на протяжении всего обхода, выдаётся ровно один раз.
/// Разрешено удалять уже выданные элементы (включая текущий); удаление ещё
/// не выданного элемента — вне контракта курсора. Курсор, брошенный до
/// исчерпания, обязан быть освобождён через [`SafeCursor::release`], иначе
/// рехеширование останется приостановленным.
pub struct SafeCursor<K, V, S = RandomState> {
    table_idx: usize,
    bucket_idx: usize,
    /// Сколько элементов текущего бакета ещё не выдано. Позиция считается
    /// от хвоста цепочки: вставки в голову и удаление уже выданных узлов
    /// не смещают её.
    remaining: Option<usize>,
    started: bool,
    finished: bool,
    _marker: PhantomData<(K, V, S)>,
}

/// Небезопасный курсор: дешёвый обходчик без приостановки переноса.
///
/// На первой выборке запоминает отпечаток структуры, на каждой следующей
/// и при освобождении сверяет его с текущим. Несовпадение — фатальная
/// ошибка использования: словарь модифицировали во время обхода, для
/// которого нужен был безопасный курсор. Подходит только для читающих
/// сканов, которые заведомо не меняют структуру.
pub struct Cursor<K, V, S = RandomState> {
    table_idx: usize,
    bucket_idx: usize,
    remaining: Option<usize>,
    fingerprint: u64,
    started: bool,
    finished: bool,
    _marker: PhantomData<(K, V, S)>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<K, V, S> Dict<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Возвращает итератор по парам `(&K, &V)`.
    pub fn iter(&self) -> DictIter<'_, K, V> {
        DictIter {
            tables: [&self.ht[0], &self.ht[1]],
            table_idx: 0,
            bucket_idx: 0,
            current_entry: None,
        }
    }

    /// Создаёт безопасный курсор. Счётчик приостановки увеличивается при
    /// первой выборке, а не при создании.
    pub fn safe_cursor(&self) -> SafeCursor<K, V, S> {
        SafeCursor {
            table_idx: 0,
            bucket_idx: 0,
            remaining: None,
            started: false,
            finished: false,
            _marker: PhantomData,
        }
    }

    /// Создаёт небезопасный (сверяемый по отпечатку) курсор.
    pub fn cursor(&self) -> Cursor<K, V, S> {
        Cursor {
            table_idx: 0,
            bucket_idx: 0,
            remaining: None,
            fingerprint: 0,
            started: false,
            finished: false,
            _marker: PhantomData,
        }
    }
}

/// Общий шаг обхода по бакетам и цепочкам обоих поколений.
///
/// Возвращает пару и обновляет позицию, либо `None`, когда бакеты
/// исчерпаны. Позиция в бакете якорится от хвоста цепочки (см.
/// [`SafeCursor`]).
fn advance<'a, K, V, S>(
    dict: &'a Dict<K, V, S>,
    table_idx: &mut usize,
    bucket_idx: &mut usize,
    remaining: &mut Option<usize>,
) -> Option<(&'a K, &'a V)> {
    loop {
        let table = &dict.ht[*table_idx];

        if *bucket_idx >= table.buckets.len() {
            if *table_idx == 0 && dict.is_rehashing() {
                *table_idx = 1;
                *bucket_idx = 0;
                *remaining = None;
                continue;
            }
            return None;
        }

        let chain = &table.buckets[*bucket_idx];
        let len = chain_len(chain);
        let rem = match *remaining {
            None => len,
            Some(r) => r.min(len),
        };

        if rem == 0 {
            *bucket_idx += 1;
            *remaining = None;
            continue;
        }

        *remaining = Some(rem - 1);

        let mut node = chain.as_ref().unwrap();
        for _ in 0..(len - rem) {
            node = node.next.as_ref().unwrap();
        }
        return Some((&node.key, &node.val));
    }
}

impl<K, V, S> SafeCursor<K, V, S> {
    /// Выдаёт следующую пару или `None`, когда обход завершён.
    ///
    /// Исчерпанный курсор освобождается автоматически.
    pub fn next<'a>(
        &mut self,
        dict: &'a Dict<K, V, S>,
    ) -> Option<(&'a K, &'a V)> {
        if self.finished {
            return None;
        }
        if !self.started {
            self.started = true;
            dict.safe_cursors.set(dict.safe_cursors.get() + 1);
        }

        let item = advance(
            dict,
            &mut self.table_idx,
            &mut self.bucket_idx,
            &mut self.remaining,
        );
        if item.is_none() {
            self.finish(dict);
        }
        item
    }

    /// Досрочно завершает обход и снимает приостановку рехеширования.
    pub fn release(
        mut self,
        dict: &Dict<K, V, S>,
    ) {
        self.finish(dict);
    }

    fn finish(
        &mut self,
        dict: &Dict<K, V, S>,
    ) {
        if self.started && !self.finished {
            // `clear` сбрасывает счётчик в ноль, поэтому вычитание
            // насыщающее.
            dict.safe_cursors
                .set(dict.safe_cursors.get().saturating_sub(1));
        }
        self.finished = true;
    }
}

impl<K, V, S> Cursor<K, V, S> {
    /// Выдаёт следующую пару или `None`, когда обход завершён.
    ///
    /// Паникует, если структура словаря изменилась с момента первой
    /// выборки.
    pub fn next<'a>(
        &mut self,
        dict: &'a Dict<K, V, S>,
    ) -> Option<(&'a K, &'a V)> {
        if self.finished {
            return None;
        }
        if !self.started {
            self.started = true;
            self.fingerprint = dict.fingerprint();
        } else {
            self.check(dict);
        }

        let item = advance(
            dict,
            &mut self.table_idx,
            &mut self.bucket_idx,
            &mut self.remaining,
        );
        if item.is_none() {
            self.finished = true;
        }
        item
    }

    /// Завершает обход, сверяя отпечаток структуры.
    ///
    /// Паникует при несовпадении: словарь модифицировали во время обхода.
    pub fn release(
        self,
        dict: &Dict<K, V, S>,
    ) {
        if self.started && !self.finished {
            self.check(dict);
        }
    }

    fn check(
        &self,
        dict: &Dict<K, V, S>,
    ) {
        assert!(
            self.fingerprint == dict.fingerprint(),
            "dictionary structurally modified during unsafe iteration"
        );
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl<'a, K, V> Iterator for DictIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            // Отдаём текущий элемент цепочки, если он есть.
            if let Some(entry) = self.current_entry.take() {
                self.current_entry = entry.next.as_deref();
                return Some((&entry.key, &entry.val));
            }

            // Бакеты текущей таблицы исчерпаны.
            if self.bucket_idx >= self.tables[self.table_idx].buckets.len() {
                // Переходим к ht[1], если она непуста (идёт рехеширование).
                if self.table_idx == 0 && !self.tables[1].is_empty_table() {
                    self.table_idx = 1;
                    self.bucket_idx = 0;
                    continue;
                }
                return None;
            }

            // Берём следующий бакет.
            self.current_entry = self.tables[self.table_idx].buckets[self.bucket_idx].as_deref();
            self.bucket_idx += 1;
        }
    }
}

impl<'a, K, V, S> IntoIterator for &'a Dict<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    type Item = (&'a K, &'a V);
    type IntoIter = DictIter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет, что итератор по пустому словарю не возвращает
    /// элементов.
    #[test]
    fn empty_iterator() {
        let d: Dict<&str, i32> = Dict::new();
        let mut iter = d.iter();
        assert_eq!(iter.next(), None);
    }

    /// Тест проверяет обход обоих поколений во время рехеширования.
    #[test]
    fn iterator_covers_both_generations() {
        let mut d: Dict<u32, u32> = Dict::new();
        for i in 0..5 {
            d.insert(i, i);
        }
        assert!(d.is_rehashing());

        let mut keys: Vec<u32> = d.iter().map(|(k, _)| *k).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec![0, 1, 2, 3, 4]);
    }

    /// Тест проверяет, что безопасный курсор приостанавливает перенос
    /// бакетов, а освобождение снимает приостановку.
    #[test]
    fn safe_cursor_pauses_rehash() {
        let mut d: Dict<u32, u32> = Dict::new();
        for i in 0..5 {
            d.insert(i, i);
        }
        assert!(d.is_rehashing());
        let idx = d.rehash_index();

        let mut cur = d.safe_cursor();
        assert!(cur.next(&d).is_some());

        // Модифицирующий поиск не двигает курсор миграции.
        let _ = d.get_mut(&0);
        let _ = d.get_mut(&1);
        assert_eq!(d.rehash_index(), idx);

        cur.release(&d);
        let _ = d.get_mut(&0);
        assert_ne!(d.rehash_index(), idx);
    }

    /// Тест проверяет, что небезопасный курсор не мешает переносу и не
    /// паникует без модификаций.
    #[test]
    fn cursor_without_mutation_is_quiet() {
        let mut d: Dict<u32, u32> = Dict::new();
        for i in 0..100 {
            d.insert(i, i);
        }
        let mut cur = d.cursor();
        let mut count = 0;
        while cur.next(&d).is_some() {
            count += 1;
        }
        assert_eq!(count, 100);
        cur.release(&d);
    }

    /// Тест проверяет фатальную сверку отпечатка при модификации во время
    /// небезопасного обхода.
    #[test]
    #[should_panic(expected = "structurally modified")]
    fn cursor_detects_mutation() {
        let mut d: Dict<u32, u32> = Dict::new();
        for i in 0..10 {
            d.insert(i, i);
        }
        let mut cur = d.cursor();
        let _ = cur.next(&d);
        d.insert(100, 100);
        cur.release(&d);
    }
}
