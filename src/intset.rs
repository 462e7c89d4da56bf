//! `IntSet` — компактное множество 64-битных целых чисел с
//! автоматическим выбором размера хранения.
//!
//! Хранит уникальные целые числа в отсортированном виде, используя
//! минимально необходимое количество байт на элемент: `i16`, `i32` или
//! `i64`, в зависимости от наибольшего по модулю вставленного значения.
//! При необходимости кодировка расширяется (upcast), чтобы вместить новые
//! значения; обратного сужения не происходит.

/// Кодировка элементов множества.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Encoding {
    Int16,
    Int32,
    Int64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntSet {
    encoding: Encoding,
    data: Vec<u8>, // Всегда отсортирован и без дубликатов.
}

impl Encoding {
    /// Размер одного элемента в байтах.
    #[inline]
    fn bytes(self) -> usize {
        match self {
            Encoding::Int16 => 2,
            Encoding::Int32 => 4,
            Encoding::Int64 => 8,
        }
    }

    /// Минимальная кодировка, вмещающая значение.
    fn for_value(x: i64) -> Encoding {
        if x >= i16::MIN as i64 && x <= i16::MAX as i64 {
            Encoding::Int16
        } else if x >= i32::MIN as i64 && x <= i32::MAX as i64 {
            Encoding::Int32
        } else {
            Encoding::Int64
        }
    }
}

impl IntSet {
    pub fn new() -> Self {
        IntSet {
            encoding: Encoding::Int16,
            data: Vec::new(),
        }
    }

    /// Возвращает количество элементов во множестве.
    pub fn len(&self) -> usize {
        self.data.len() / self.encoding.bytes()
    }

    /// Проверяет, пустое ли множество.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Текущая кодировка элементов.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Приблизительный объём памяти под множеством в байтах.
    pub fn bytes(&self) -> usize {
        std::mem::size_of::<IntSet>() + self.data.len()
    }

    /// Читает элемент по индексу в текущей кодировке.
    fn read_at(
        &self,
        index: usize,
    ) -> i64 {
        let eb = self.encoding.bytes();
        let at = &self.data[index * eb..index * eb + eb];
        match self.encoding {
            Encoding::Int16 => i16::from_le_bytes(at.try_into().unwrap()) as i64,
            Encoding::Int32 => i32::from_le_bytes(at.try_into().unwrap()) as i64,
            Encoding::Int64 => i64::from_le_bytes(at.try_into().unwrap()),
        }
    }

    /// Бинарный поиск, возвращает (found, pos). pos — место вставки, если
    /// значение не найдено.
    fn find(
        &self,
        value: i64,
    ) -> (bool, usize) {
        let mut lo = 0;
        let mut hi = self.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            let mid_val = self.read_at(mid);
            if mid_val == value {
                return (true, mid);
            } else if mid_val < value {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        (false, lo)
    }

    pub fn contains(
        &self,
        value: i64,
    ) -> bool {
        self.find(value).0
    }

    /// Вставляет значение. Возвращает `false`, если оно уже было.
    pub fn insert(
        &mut self,
        value: i64,
    ) -> bool {
        // При необходимости апгрейдим кодировку.
        let need_enc = Encoding::for_value(value);
        if need_enc > self.encoding {
            self.upgrade(need_enc);
        }

        let (exists, pos) = self.find(value);
        if exists {
            return false;
        }

        let eb = self.encoding.bytes();
        let mut buf = [0u8; 8];
        match self.encoding {
            Encoding::Int16 => buf[..eb].copy_from_slice(&(value as i16).to_le_bytes()),
            Encoding::Int32 => buf[..eb].copy_from_slice(&(value as i32).to_le_bytes()),
            Encoding::Int64 => buf[..eb].copy_from_slice(&value.to_le_bytes()),
        }
        self.data
            .splice(pos * eb..pos * eb, buf[..eb].iter().copied());
        true
    }

    /// Удаляет значение. Возвращает `false`, если его не было.
    pub fn remove(
        &mut self,
        value: i64,
    ) -> bool {
        let (exists, pos) = self.find(value);
        if !exists {
            return false;
        }
        let eb = self.encoding.bytes();
        self.data.drain(pos * eb..pos * eb + eb);
        true
    }

    /// Возвращает элемент по индексу в порядке сортировки.
    pub fn get(
        &self,
        index: usize,
    ) -> Option<i64> {
        (index < self.len()).then(|| self.read_at(index))
    }

    /// Возвращает случайный элемент множества.
    pub fn random(&self) -> Option<i64> {
        if self.is_empty() {
            return None;
        }
        Some(self.read_at(fastrand::usize(0..self.len())))
    }

    /// Расширяет кодировку на месте, переписывая буфер с конца.
    fn upgrade(
        &mut self,
        new_enc: Encoding,
    ) {
        let len = self.len();
        let values: Vec<i64> = self.iter().collect();

        self.encoding = new_enc;
        self.data = Vec::with_capacity(len * new_enc.bytes());
        for v in values {
            match new_enc {
                Encoding::Int16 => unreachable!("upgrade never narrows"),
                Encoding::Int32 => self.data.extend_from_slice(&(v as i32).to_le_bytes()),
                Encoding::Int64 => self.data.extend_from_slice(&v.to_le_bytes()),
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        (0..self.len()).map(move |i| self.read_at(i))
    }

    pub fn into_vec(self) -> Vec<i64> {
        self.iter().collect()
    }
}

impl Default for IntSet {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<i64> for IntSet {
    fn from_iter<T: IntoIterator<Item = i64>>(iter: T) -> Self {
        let mut set = IntSet::new();
        for v in iter {
            set.insert(v);
        }
        set
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
