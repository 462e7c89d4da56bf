//! Модуль "Умная динамическая строка" (Sds)
//!
//! Эффективная структура для хранения байтовых строк: короткие строки
//! живут в стеке, длинные — в куче. Переключение между режимами
//! происходит автоматически: рост уводит строку в кучу, усечение
//! возвращает в стек. Помимо базовых операций реализованы строковые
//! утилиты обслуживания: обрезка по диапазону с отрицательными
//! индексами, срезание набора символов с краёв, дополнение нулями и
//! разбиение по разделителю.

use std::{
    cmp::Ordering,
    fmt::{self, Display, Write as FmtWrite},
    hash::{Hash, Hasher},
    ops::{Deref, DerefMut},
    str::{from_utf8, Utf8Error},
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Представление строки: в стеке (короткая) или в куче (длинная).
#[derive(Debug, Clone)]
enum Repr {
    /// Короткая строка, хранимая напрямую в стеке.
    Inline { len: u8, buf: [u8; Sds::INLINE_CAP] },
    /// Длинная строка, хранимая в куче.
    Heap { buf: Vec<u8>, len: usize },
}

/// Основная структура умной строки.
#[derive(Debug, Clone)]
pub struct Sds(Repr);

impl Sds {
    /// Максимальный размер строки, при котором используется стековое
    /// представление.
    pub const INLINE_CAP: usize = 22;

    /// Создаёт Sds из вектора байт, выбирая стек или кучу в зависимости от
    /// размера.
    #[inline(always)]
    pub fn from_vec(vec: Vec<u8>) -> Self {
        let len = vec.len();
        if len <= Self::INLINE_CAP {
            let mut buf = [0u8; Self::INLINE_CAP];
            buf[..len].copy_from_slice(&vec);
            Sds(Repr::Inline {
                len: len as u8,
                buf,
            })
        } else {
            Sds(Repr::Heap { buf: vec, len })
        }
    }

    /// Создаёт Sds из байтов, копируя их при необходимости.
    pub fn from_bytes<B: AsRef<[u8]>>(bytes: B) -> Self {
        let slice = bytes.as_ref();
        Sds::from(slice)
    }

    /// Создаёт строку из &str, автоматически определяя способ хранения.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        Sds::from(s.as_bytes())
    }

    /// Возвращает содержимое строки как срез байт.
    pub fn as_slice(&self) -> &[u8] {
        match &self.0 {
            Repr::Inline { len, buf } => &buf[..*len as usize],
            Repr::Heap { buf, len } => &buf[..*len],
        }
    }

    /// Возвращает байтовое представление строки (аналог `as_slice`).
    pub fn as_bytes(&self) -> &[u8] {
        self.as_slice()
    }

    /// Возвращает изменяемый срез байт.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.0 {
            Repr::Inline { len, buf } => &mut buf[..*len as usize],
            Repr::Heap { buf, len } => &mut buf[..*len],
        }
    }

    /// Возвращает текущую длину строки.
    #[inline(always)]
    pub fn len(&self) -> usize {
        match &self.0 {
            Repr::Inline { len, .. } => *len as usize,
            Repr::Heap { len, .. } => *len,
        }
    }

    /// Проверяет, пуста ли строка.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Возвращает `true`, если строка хранится в стеке.
    #[inline(always)]
    pub fn is_inline(&self) -> bool {
        matches!(self.0, Repr::Inline { .. })
    }

    /// Возвращает текущую ёмкость буфера (полезно только для кучи).
    pub fn capacity(&self) -> usize {
        match &self.0 {
            Repr::Inline { .. } => Self::INLINE_CAP,
            Repr::Heap { buf, .. } => buf.capacity(),
        }
    }

    /// Резервирует место для дополнительных байт.
    pub fn reserve(
        &mut self,
        additional: usize,
    ) {
        match &mut self.0 {
            Repr::Inline { len, buf } => {
                let cur_len = *len as usize;
                if cur_len + additional <= Self::INLINE_CAP {
                    return;
                }
                let mut vec = Vec::with_capacity((cur_len + additional).next_power_of_two());
                vec.extend_from_slice(&buf[..cur_len]);
                self.0 = Repr::Heap {
                    len: cur_len,
                    buf: vec,
                };
            }
            Repr::Heap { buf, .. } => buf.reserve(additional),
        }
    }

    /// Очищает содержимое строки (длина = 0).
    pub fn clear(&mut self) {
        match &mut self.0 {
            Repr::Inline { len, .. } => *len = 0,
            Repr::Heap { len, .. } => *len = 0,
        }
    }

    /// Добавляет один байт в конец строки.
    pub fn push(
        &mut self,
        byte: u8,
    ) {
        match &mut self.0 {
            Repr::Inline { len, buf } => {
                let cur_len = *len as usize;
                if cur_len < Self::INLINE_CAP {
                    buf[cur_len] = byte;
                    *len += 1;
                } else {
                    let mut vec = Vec::with_capacity((cur_len + 1).next_power_of_two());
                    vec.extend_from_slice(&buf[..cur_len]);
                    vec.push(byte);
                    self.0 = Repr::Heap {
                        len: vec.len(),
                        buf: vec,
                    };
                }
            }
            Repr::Heap { buf, len } => {
                if *len < buf.len() {
                    buf[*len] = byte;
                } else {
                    buf.push(byte);
                }
                *len += 1;
            }
        }
    }

    /// Добавляет байтовую строку в конец текущей строки.
    pub fn append(
        &mut self,
        other: &[u8],
    ) {
        let total = self.len() + other.len();
        match &mut self.0 {
            Repr::Inline { len, buf } => {
                let cur_len = *len as usize;
                if total <= Self::INLINE_CAP {
                    buf[cur_len..total].copy_from_slice(other);
                    *len = total as u8;
                } else {
                    let mut vec = Vec::with_capacity(total.next_power_of_two());
                    vec.extend_from_slice(&buf[..cur_len]);
                    vec.extend_from_slice(other);
                    self.0 = Repr::Heap {
                        len: vec.len(),
                        buf: vec,
                    };
                }
            }
            Repr::Heap { buf, len } => {
                let cur_len = *len;
                let needed = cur_len + other.len();

                if buf.capacity() < needed {
                    buf.reserve((needed - buf.len()).next_power_of_two());
                }

                if buf.len() < needed {
                    buf.truncate(cur_len);
                    buf.extend_from_slice(other);
                } else {
                    buf[cur_len..needed].copy_from_slice(other);
                }

                *len = needed;
            }
        }
    }

    /// Обрезает строку до указанной длины.
    pub fn truncate(
        &mut self,
        new_len: usize,
    ) {
        match &mut self.0 {
            Repr::Inline { len, .. } => {
                *len = new_len.min(*len as usize) as u8;
            }
            Repr::Heap { len, .. } => {
                *len = new_len.min(*len);
            }
        }
        self.inline_downgrade();
    }

    /// Возвращает копию среза строки в указанном диапазоне `[start, end)`.
    pub fn slice_range(
        &self,
        start: usize,
        end: usize,
    ) -> Self {
        assert!(start <= end && end <= self.len(), "invalid slice range");
        Sds::from(&self.as_slice()[start..end])
    }

    /// Оставляет в строке только диапазон `[start, end]` (включительно).
    ///
    /// Отрицательные индексы отсчитываются от конца строки. Диапазон,
    /// выходящий за границы после пересчёта, — нарушение контракта
    /// вызывающего.
    pub fn range(
        &mut self,
        start: isize,
        end: isize,
    ) {
        let len = self.len() as isize;
        let start = if start < 0 { start + len } else { start };
        let end = if end < 0 { end + len } else { end };
        assert!(
            0 <= start && start <= end && end <= len - 1,
            "range out of bounds"
        );

        let (s, e) = (start as usize, end as usize);
        let new_len = e - s + 1;
        match &mut self.0 {
            Repr::Inline { len, buf } => {
                buf.copy_within(s..=e, 0);
                *len = new_len as u8;
            }
            Repr::Heap { buf, len } => {
                buf.copy_within(s..=e, 0);
                *len = new_len;
            }
        }
        self.inline_downgrade();
    }

    /// Срезает с обоих краёв все байты, входящие в набор `cset`.
    pub fn trim(
        &mut self,
        cset: &[u8],
    ) {
        let slice = self.as_slice();
        let mut start = 0usize;
        let mut end = slice.len();
        while start < end && cset.contains(&slice[start]) {
            start += 1;
        }
        while end > start && cset.contains(&slice[end - 1]) {
            end -= 1;
        }

        let new_len = end - start;
        match &mut self.0 {
            Repr::Inline { len, buf } => {
                buf.copy_within(start..end, 0);
                *len = new_len as u8;
            }
            Repr::Heap { buf, len } => {
                buf.copy_within(start..end, 0);
                *len = new_len;
            }
        }
        self.inline_downgrade();
    }

    /// Доращивает строку нулевыми байтами до длины `len`.
    pub fn grow_zero(
        &mut self,
        len: usize,
    ) {
        if len <= self.len() {
            return;
        }
        let zeros = vec![0u8; len - self.len()];
        self.append(&zeros);
    }

    /// Приводит ASCII-байты к нижнему регистру на месте.
    pub fn make_ascii_lowercase(&mut self) {
        self.as_mut_slice().make_ascii_lowercase();
    }

    /// Приводит ASCII-байты к верхнему регистру на месте.
    pub fn make_ascii_uppercase(&mut self) {
        self.as_mut_slice().make_ascii_uppercase();
    }

    /// Освобождает неиспользуемую ёмкость кучи.
    pub fn remove_free_space(&mut self) {
        if let Repr::Heap { buf, len } = &mut self.0 {
            buf.truncate(*len);
            buf.shrink_to_fit();
        }
    }

    /// Разбивает строку по разделителю. Пустая строка или пустой
    /// разделитель дают пустой результат.
    pub fn split_on(
        &self,
        sep: &[u8],
    ) -> Vec<Sds> {
        let s = self.as_slice();
        let mut tokens = Vec::new();
        if s.is_empty() || sep.is_empty() {
            return tokens;
        }

        let mut start = 0usize;
        let mut i = 0usize;
        while i + sep.len() <= s.len() {
            if &s[i..i + sep.len()] == sep {
                tokens.push(Sds::from(&s[start..i]));
                start = i + sep.len();
                i = start;
            } else {
                i += 1;
            }
        }
        tokens.push(Sds::from(&s[start..]));
        tokens
    }

    /// Преобразует байтовое представление строки в `&str`, если она
    /// валидна как UTF-8.
    pub fn as_str(&self) -> Result<&str, Utf8Error> {
        from_utf8(self.as_slice())
    }

    /// Преобразует строку обратно в стековое представление, если она стала
    /// достаточно короткой.
    fn inline_downgrade(&mut self) {
        if let Repr::Heap { buf, len } = &self.0 {
            if *len <= Self::INLINE_CAP {
                let mut inline_buf = [0u8; Self::INLINE_CAP];
                inline_buf[..*len].copy_from_slice(&buf[..*len]);
                self.0 = Repr::Inline {
                    len: *len as u8,
                    buf: inline_buf,
                }
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for Sds {
    fn default() -> Self {
        Sds(Repr::Inline {
            len: 0,
            buf: [0u8; Sds::INLINE_CAP],
        })
    }
}

impl From<&[u8]> for Sds {
    fn from(slice: &[u8]) -> Self {
        if slice.len() <= Sds::INLINE_CAP {
            let mut buf = [0u8; Sds::INLINE_CAP];
            buf[..slice.len()].copy_from_slice(slice);
            Sds(Repr::Inline {
                len: slice.len() as u8,
                buf,
            })
        } else {
            Sds(Repr::Heap {
                len: slice.len(),
                buf: slice.to_vec(),
            })
        }
    }
}

impl From<i64> for Sds {
    fn from(value: i64) -> Self {
        let mut s = Sds::default();
        write!(s, "{value}").expect("formatting into Sds is infallible");
        s
    }
}

// Реализация преобразования из &str в Sds через трейт FromStr.
impl std::str::FromStr for Sds {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Sds::from_str(s))
    }
}

impl FmtWrite for Sds {
    fn write_str(
        &mut self,
        s: &str,
    ) -> fmt::Result {
        self.append(s.as_bytes());
        Ok(())
    }
}

impl Deref for Sds {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl DerefMut for Sds {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl Display for Sds {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self.as_str() {
            Ok(s) => write!(f, "{s}"),
            Err(_) => write!(f, "{:?}", self.as_slice()),
        }
    }
}

impl Hash for Sds {
    fn hash<H: Hasher>(
        &self,
        state: &mut H,
    ) {
        self.as_slice().hash(state);
    }
}

impl PartialEq for Sds {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Sds {}

impl PartialOrd for Sds {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Sds {
    fn cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

impl TryFrom<Sds> for String {
    type Error = Utf8Error;
    fn try_from(value: Sds) -> Result<Self, Self::Error> {
        value.as_str().map(|s| s.to_string())
    }
}

impl Serialize for Sds {
    fn serialize<S>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(self.as_slice())
    }
}

impl<'de> Deserialize<'de> for Sds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = <Vec<u8>>::deserialize(deserializer)?;
        Ok(Sds::from_vec(bytes))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
