use std::{
    cell::Cell,
    hash::{BuildHasher, Hash, RandomState},
    mem,
    time::{Duration, Instant},
};

use tracing::{debug, trace};

/// Начальный размер таблицы (степень двойки).
pub(crate) const INITIAL_SIZE: usize = 4;

/// Порог load factor, при котором расширение выполняется даже если
/// автоматическое изменение размера выключено.
const FORCE_RESIZE_RATIO: usize = 5;

/// Бюджет пустых бакетов на один шаг рехеширования (умножается на `n`).
const EMPTY_VISITS_PER_STEP: usize = 10;

/// Количество бакетов, переносимых одним пакетом в `rehash_millis`.
const REHASH_BATCH: usize = 100;

/// Один элемент в цепочке коллизий.
#[derive(Debug, Clone)]
pub(crate) struct DictNode<K, V> {
    pub(crate) key: K,
    pub(crate) val: V,
    pub(crate) next: Option<Box<DictNode<K, V>>>,
}

/// Одна хеш-таблица: вектор бакетов, маска размера и количество занятых
/// элементов. Неинициализированная таблица — пустой вектор с маской 0.
#[derive(Debug, Clone)]
pub(crate) struct HashTable<K, V> {
    pub(crate) buckets: Vec<Option<Box<DictNode<K, V>>>>,
    pub(crate) size_mask: usize,
    pub(crate) used: usize,
}

/// Хеш-таблица с инкрементальным рехешированием.
///
/// **ИНВАРИАНТЫ:**
///
/// - Если `rehash_idx == -1`:
///     - ht[1] пуста
///     - все элементы находятся в ht[0]
///
/// - Если `rehash_idx >= 0`:
///     - рехеширование в процессе
///     - элементы распределены между ht[0] и ht[1]
///     - бакеты ht[0] с индексами ниже `rehash_idx` уже пусты
///
/// - Общее количество элементов всегда равно `ht[0].used + ht[1].used`.
///
/// - Размер непустой таблицы — степень двойки не меньше 4.
///
/// Рехеширование происходит постепенно: каждая модифицирующая операция
/// переносит не более одного непустого бакета. Пока жив хотя бы один
/// безопасный курсор (см. `safe_cursor`), перенос и смена размеров
/// приостановлены, поэтому обе таблицы стабильны на всё время обхода.
#[derive(Debug, Clone)]
pub struct Dict<K, V, S = RandomState> {
    pub(crate) ht: [HashTable<K, V>; 2],
    pub(crate) rehash_idx: isize,
    /// Счётчик живых безопасных курсоров; > 0 — перенос приостановлен.
    pub(crate) safe_cursors: Cell<u32>,
    /// Поколение таблиц: растёт при каждом выделении/освобождении/подмене
    /// массива бакетов. Входит в отпечаток структуры.
    pub(crate) epoch: u64,
    resize_enabled: bool,
    hasher: S,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<K, V> HashTable<K, V> {
    /// Создаёт таблицу ёмкостью `cap` бакетов.
    pub(crate) fn with_capacity(cap: usize) -> Self {
        if cap == 0 {
            return HashTable {
                buckets: Vec::new(),
                size_mask: 0,
                used: 0,
            };
        }

        let sz = cap.next_power_of_two().max(INITIAL_SIZE);
        let mut buckets = Vec::with_capacity(sz);
        buckets.resize_with(sz, || None);

        HashTable {
            buckets,
            size_mask: sz - 1,
            used: 0,
        }
    }

    /// Сбрасывает таблицу в пустое состояние, освобождая все цепочки.
    fn clear(&mut self) {
        self.buckets.clear();
        self.buckets.shrink_to_fit();
        self.size_mask = 0;
        self.used = 0;
    }

    /// Возвращает `true`, если таблица не инициализирована (нет бакетов).
    #[inline]
    pub(crate) fn is_empty_table(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Длина цепочки коллизий.
pub(crate) fn chain_len<K, V>(head: &Option<Box<DictNode<K, V>>>) -> usize {
    let mut len = 0;
    let mut cur = head;
    while let Some(node) = cur {
        len += 1;
        cur = &node.next;
    }
    len
}

impl<K, V> Dict<K, V>
where
    K: Hash + Eq,
{
    /// Создаёт новый пустой словарь со стандартным хешером.
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<K, V, S> Dict<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Создаёт словарь с заданным хешером. Сид хеш-функции принадлежит
    /// конкретному экземпляру, глобального состояния нет.
    pub fn with_hasher(hasher: S) -> Self {
        Dict {
            ht: [HashTable::with_capacity(0), HashTable::with_capacity(0)],
            rehash_idx: -1,
            safe_cursors: Cell::new(0),
            epoch: 0,
            resize_enabled: true,
            hasher,
        }
    }

    /// Вставляет пару `(key, val)`, только если ключа ещё нет.
    ///
    /// Возвращает `false` (и не трогает существующее значение), если ключ
    /// уже присутствует в любом из двух поколений таблицы.
    pub fn insert(
        &mut self,
        key: K,
        val: V,
    ) -> bool {
        self.rehash_step_if_active();
        self.expand_if_needed();

        let hash = self.hash_key(&key);
        if self.find_coords(hash, &key).is_some() {
            return false;
        }

        self.push_front(hash, key, val);
        true
    }

    /// Вставляет пару или перезаписывает значение существующего ключа.
    ///
    /// Возвращает `true`, если создан новый элемент, и `false`, если
    /// значение перезаписано. Старое значение освобождается до записи
    /// нового.
    pub fn replace(
        &mut self,
        key: K,
        val: V,
    ) -> bool {
        self.rehash_step_if_active();
        self.expand_if_needed();

        let hash = self.hash_key(&key);
        if let Some((t, slot, pos)) = self.find_coords(hash, &key) {
            let mut node = self.ht[t].buckets[slot].as_mut().unwrap();
            for _ in 0..pos {
                node = node.next.as_mut().unwrap();
            }
            node.val = val;
            return false;
        }

        self.push_front(hash, key, val);
        true
    }

    /// Возвращает `Some(&V)` для указанного ключа или `None`.
    ///
    /// Чистый поиск: не двигает курсор рехеширования (работает по
    /// разделяемой ссылке).
    pub fn get(
        &self,
        key: &K,
    ) -> Option<&V> {
        let hash = self.hash_key(key);
        let (t, slot, pos) = self.find_coords(hash, key)?;

        let mut node = self.ht[t].buckets[slot].as_ref().unwrap();
        for _ in 0..pos {
            node = node.next.as_ref().unwrap();
        }
        Some(&node.val)
    }

    /// Возвращает `Some(&mut V)` для указанного ключа или `None`.
    ///
    /// Модифицирующий поиск: при активном рехешировании сначала переносит
    /// один бакет.
    pub fn get_mut(
        &mut self,
        key: &K,
    ) -> Option<&mut V> {
        self.rehash_step_if_active();

        let hash = self.hash_key(key);
        let (t, slot, pos) = self.find_coords(hash, key)?;

        let mut node = self.ht[t].buckets[slot].as_mut().unwrap();
        for _ in 0..pos {
            node = node.next.as_mut().unwrap();
        }
        Some(&mut node.val)
    }

    /// Удаляет ключ. Возвращает `true`, если удаление произошло.
    pub fn remove(
        &mut self,
        key: &K,
    ) -> bool {
        if self.ht[0].is_empty_table() {
            return false;
        }
        self.rehash_step_if_active();

        let hash = self.hash_key(key);
        let rehashing = self.is_rehashing();
        let cursor = self.rehash_idx;
        let tables = if rehashing { 2 } else { 1 };

        for t in 0..tables {
            let slot = (hash as usize) & self.ht[t].size_mask;
            // Бакеты ht[0] ниже курсора уже перенесены.
            if t == 0 && rehashing && (slot as isize) < cursor {
                continue;
            }
            if Self::unlink_from_chain(&mut self.ht[t].buckets[slot], key) {
                self.ht[t].used -= 1;
                return true;
            }
        }
        false
    }

    /// Возвращает общее количество элементов в обоих поколениях.
    #[inline]
    pub fn len(&self) -> usize {
        self.ht[0].used + self.ht[1].used
    }

    /// Возвращает `true`, если словарь пуст.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Текущая ёмкость: размер целевого поколения.
    #[inline]
    pub fn capacity(&self) -> usize {
        if self.is_rehashing() {
            self.ht[1].buckets.len()
        } else {
            self.ht[0].buckets.len()
        }
    }

    /// Индекс бакета, до которого дошла миграция, или `None` вне
    /// рехеширования.
    #[inline]
    pub fn rehash_index(&self) -> Option<usize> {
        (self.rehash_idx >= 0).then_some(self.rehash_idx as usize)
    }

    /// Разрешает автоматическое изменение размера (включено по умолчанию).
    pub fn enable_resize(&mut self) {
        self.resize_enabled = true;
    }

    /// Запрещает автоматическое изменение размера. Расширение всё равно
    /// произойдёт принудительно при load factor ≥ 5.
    pub fn disable_resize(&mut self) {
        self.resize_enabled = false;
    }

    /// Очищает словарь: освобождает оба поколения и сбрасывает рехешинг.
    pub fn clear(&mut self) {
        self.ht[0].clear();
        self.ht[1].clear();
        self.rehash_idx = -1;
        self.safe_cursors.set(0);
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Расширяет (или сжимает при явном вызове) таблицу до ближайшей сверху
    /// степени двойки от `size`.
    ///
    /// Ничего не делает и возвращает `false`, если уже идёт рехеширование,
    /// жив безопасный курсор, `size` меньше текущего количества элементов
    /// или округлённый размер совпадает с текущим.
    pub fn expand(
        &mut self,
        size: usize,
    ) -> bool {
        if self.is_rehashing() || self.safe_cursors.get() > 0 || self.ht[0].used > size {
            return false;
        }

        let realsize = size.next_power_of_two().max(INITIAL_SIZE);
        if realsize == self.ht[0].buckets.len() {
            return false;
        }

        self.install_table(HashTable::with_capacity(realsize))
    }

    /// Сжимает таблицу до `max(len, 4)`. Допустимо только вне рехеширования
    /// и при разрешённом изменении размера.
    pub fn shrink(&mut self) -> bool {
        if self.is_rehashing() || !self.resize_enabled {
            return false;
        }

        let target = self.ht[0].used.max(INITIAL_SIZE);
        self.expand(target)
    }

    /// Выполняет пакеты рехеширования, пока миграция не завершится или не
    /// истечёт бюджет времени в миллисекундах. Возвращает количество
    /// выполненных шагов.
    ///
    /// Предназначено для фоновой доводки между обслуживанием запросов, а не
    /// для горячего пути отдельной операции.
    pub fn rehash_millis(
        &mut self,
        ms: u64,
    ) -> usize {
        if self.safe_cursors.get() > 0 {
            return 0;
        }

        let budget = Duration::from_millis(ms);
        let start = Instant::now();
        let mut steps = 0;

        while self.rehash_n(REHASH_BATCH) {
            steps += REHASH_BATCH;
            if start.elapsed() >= budget {
                break;
            }
        }
        steps
    }

    /// Вычисляет хеш ключа как u64.
    #[inline]
    pub(crate) fn hash_key(
        &self,
        key: &K,
    ) -> u64 {
        self.hasher.hash_one(key)
    }

    /// Ищет ключ в обоих поколениях.
    ///
    /// Возвращает координаты `(таблица, бакет, позиция в цепочке)` или
    /// `None`, если ключа нет.
    pub(crate) fn find_coords(
        &self,
        hash: u64,
        key: &K,
    ) -> Option<(usize, usize, usize)> {
        if self.ht[0].is_empty_table() {
            return None;
        }

        let tables = if self.is_rehashing() { 2 } else { 1 };
        for t in 0..tables {
            let slot = (hash as usize) & self.ht[t].size_mask;
            if t == 0 && self.is_rehashing() && (slot as isize) < self.rehash_idx {
                continue;
            }

            let mut pos = 0;
            let mut cur = &self.ht[t].buckets[slot];
            while let Some(node) = cur {
                if node.key == *key {
                    return Some((t, slot, pos));
                }
                cur = &node.next;
                pos += 1;
            }
        }
        None
    }

    /// Вставляет новый элемент в начало цепочки целевого поколения.
    ///
    /// Целевое поколение — ht[1] во время рехеширования, иначе ht[0].
    /// Ключ обязан отсутствовать в словаре.
    fn push_front(
        &mut self,
        hash: u64,
        key: K,
        val: V,
    ) {
        let t = if self.is_rehashing() { 1 } else { 0 };
        let table = &mut self.ht[t];
        let slot = (hash as usize) & table.size_mask;

        let next = table.buckets[slot].take();
        table.buckets[slot] = Some(Box::new(DictNode { key, val, next }));
        table.used += 1;
    }

    /// Изымает из цепочки первый узел с ключом `key`.
    fn unlink_from_chain(
        head: &mut Option<Box<DictNode<K, V>>>,
        key: &K,
    ) -> bool {
        let mut cur = head;
        loop {
            match cur {
                None => return false,
                Some(node) if node.key == *key => {
                    // Изымаем текущий узел, подставляя вместо него его хвост.
                    *cur = node.next.take();
                    return true;
                }
                Some(node) => {
                    cur = &mut node.next;
                }
            }
        }
    }

    /// Выполняет один ограниченный шаг рехеширования, если оно активно и
    /// не приостановлено безопасным курсором.
    pub(crate) fn rehash_step_if_active(&mut self) {
        if self.is_rehashing() && self.safe_cursors.get() == 0 {
            self.rehash_n(1);
        }
    }

    /// Переносит до `n` непустых бакетов из ht[0] в ht[1].
    ///
    /// На весь вызов даётся бюджет `n * 10` пустых бакетов, чтобы один шаг
    /// не сканировал разреженную область неограниченно. Возвращает `true`,
    /// пока миграция не завершена.
    pub(crate) fn rehash_n(
        &mut self,
        n: usize,
    ) -> bool {
        if !self.is_rehashing() {
            return false;
        }

        let mut remaining = n;
        let mut empty_visits = n * EMPTY_VISITS_PER_STEP;

        while remaining > 0 && self.ht[0].used != 0 {
            assert!(
                (self.rehash_idx as usize) < self.ht[0].buckets.len(),
                "rehash cursor ran past the old table"
            );

            // Пропускаем подряд идущие пустые бакеты в пределах бюджета.
            while self.ht[0].buckets[self.rehash_idx as usize].is_none() {
                self.rehash_idx += 1;
                empty_visits -= 1;
                if empty_visits == 0 {
                    return true;
                }
            }

            // Переносим всю цепочку бакета в ht[1].
            let idx = self.rehash_idx as usize;
            let mut entry = self.ht[0].buckets[idx].take();
            while let Some(mut node) = entry {
                entry = node.next.take();

                let hash = self.hash_key(&node.key);
                let slot = (hash as usize) & self.ht[1].size_mask;

                node.next = self.ht[1].buckets[slot].take();
                self.ht[1].buckets[slot] = Some(node);

                assert!(self.ht[0].used > 0, "used-count underflow during rehash");
                self.ht[0].used -= 1;
                self.ht[1].used += 1;
            }

            self.rehash_idx += 1;
            remaining -= 1;
        }

        // Все элементы перенесены — ht[1] становится новым ht[0].
        if self.ht[0].used == 0 {
            self.ht[0] = mem::replace(&mut self.ht[1], HashTable::with_capacity(0));
            self.rehash_idx = -1;
            self.epoch = self.epoch.wrapping_add(1);
            trace!(
                size = self.ht[0].buckets.len(),
                "incremental rehash complete"
            );
            return false;
        }
        true
    }

    /// Инициирует рехеширование при load factor ≥ 1.
    ///
    /// Самая первая вставка просто выделяет ht[0] минимального размера.
    /// Пока жив безопасный курсор, новые миграции не начинаются: структура
    /// поколений заморожена на время обхода.
    pub(crate) fn expand_if_needed(&mut self) {
        if self.is_rehashing() {
            return;
        }

        if self.ht[0].is_empty_table() {
            self.ht[0] = HashTable::with_capacity(INITIAL_SIZE);
            self.epoch = self.epoch.wrapping_add(1);
            return;
        }

        if self.safe_cursors.get() > 0 {
            return;
        }

        let size = self.ht[0].buckets.len();
        let used = self.ht[0].used;
        let ratio = used / size;

        if ratio >= 1 && (self.resize_enabled || ratio >= FORCE_RESIZE_RATIO) {
            if !self.resize_enabled {
                debug!(used, size, "forced resize: chain length bound exceeded");
            }
            self.expand(used * 2);
        }
    }

    /// Устанавливает новую таблицу: напрямую, если ht[0] не содержит
    /// элементов, иначе как второе поколение с курсором на нуле.
    fn install_table(
        &mut self,
        table: HashTable<K, V>,
    ) -> bool {
        assert!(!self.is_rehashing(), "resize attempted mid-rehash");
        self.epoch = self.epoch.wrapping_add(1);

        // Переносить нечего — новая таблица сразу становится активной.
        if self.ht[0].used == 0 {
            self.ht[0] = table;
            return true;
        }

        trace!(
            from = self.ht[0].buckets.len(),
            to = table.buckets.len(),
            "incremental rehash started"
        );
        self.ht[1] = table;
        self.rehash_idx = 0;
        true
    }

}

/// Методы, не зависящие от `K: Hash + Eq` / `S: BuildHasher`: читают только
/// структурные поля словаря.
impl<K, V, S> Dict<K, V, S> {
    /// Возвращает `true`, если идёт инкрементальное рехеширование.
    #[inline]
    pub fn is_rehashing(&self) -> bool {
        self.rehash_idx != -1
    }

    /// Отпечаток структуры: смесь поколения таблиц и счётчиков обоих
    /// поколений. Любое выделение/освобождение массива бакетов или
    /// изменение числа элементов меняет отпечаток.
    pub(crate) fn fingerprint(&self) -> u64 {
        let inputs = [
            self.epoch,
            self.ht[0].buckets.len() as u64,
            self.ht[0].used as u64,
            self.ht[1].buckets.len() as u64,
            self.ht[1].used as u64,
        ];

        let mut hash: u64 = 0;
        for v in inputs {
            hash = hash.wrapping_add(v);
            // 64-битное перемешивание Томаса Ванга.
            hash = (!hash).wrapping_add(hash << 21);
            hash ^= hash >> 24;
            hash = hash.wrapping_add(hash << 3).wrapping_add(hash << 8);
            hash ^= hash >> 14;
            hash = hash.wrapping_add(hash << 2).wrapping_add(hash << 4);
            hash ^= hash >> 28;
            hash = hash.wrapping_add(hash << 31);
        }
        hash
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl<K, V> Default for Dict<K, V>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
