//! Учёт памяти процесса.
//!
//! Обёртка над системным аллокатором, ведущая атомарный счётчик занятых
//! байт. Контракт аллокатора безотказный: исчерпание памяти завершает
//! процесс через стандартный обработчик ошибок аллокации, восстановимого
//! пути out-of-memory нет.

use std::{
    alloc::{GlobalAlloc, Layout, System},
    sync::atomic::{AtomicUsize, Ordering},
};

/// Аллокатор с учётом занятой памяти.
///
/// Размер каждого блока округляется вверх до машинного слова — так
/// счётчик ближе к фактически занятой памяти, чем к сумме запрошенных
/// размеров. Подходит как `#[global_allocator]`:
///
/// ```ignore
/// #[global_allocator]
/// static ALLOC: TrackingAlloc = TrackingAlloc::new();
/// ```
#[derive(Debug)]
pub struct TrackingAlloc<A: GlobalAlloc = System> {
    inner: A,
    used: AtomicUsize,
}

impl TrackingAlloc<System> {
    /// Создаёт обёртку над системным аллокатором.
    pub const fn new() -> Self {
        Self::with_inner(System)
    }
}

impl<A: GlobalAlloc> TrackingAlloc<A> {
    /// Создаёт обёртку над произвольным аллокатором.
    pub const fn with_inner(inner: A) -> Self {
        TrackingAlloc {
            inner,
            used: AtomicUsize::new(0),
        }
    }

    /// Текущий объём занятой памяти в байтах.
    pub fn used_memory(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }

    /// Отношение резидентной памяти процесса к учтённой.
    ///
    /// Возвращает 0.0, когда ни одного байта не учтено или RSS
    /// недоступен.
    pub fn fragmentation_ratio(&self) -> f64 {
        let used = self.used_memory();
        if used == 0 {
            return 0.0;
        }
        resident_set_size() as f64 / used as f64
    }

    /// Округление до машинного слова.
    #[inline]
    fn rounded(size: usize) -> usize {
        let word = std::mem::size_of::<usize>();
        let rem = size & (word - 1);
        if rem == 0 {
            size
        } else {
            size + word - rem
        }
    }

    #[inline]
    fn stat_alloc(
        &self,
        size: usize,
    ) {
        self.used.fetch_add(Self::rounded(size), Ordering::Relaxed);
    }

    #[inline]
    fn stat_free(
        &self,
        size: usize,
    ) {
        self.used.fetch_sub(Self::rounded(size), Ordering::Relaxed);
    }
}

unsafe impl<A: GlobalAlloc> GlobalAlloc for TrackingAlloc<A> {
    unsafe fn alloc(
        &self,
        layout: Layout,
    ) -> *mut u8 {
        let p = self.inner.alloc(layout);
        if !p.is_null() {
            self.stat_alloc(layout.size());
        }
        p
    }

    unsafe fn alloc_zeroed(
        &self,
        layout: Layout,
    ) -> *mut u8 {
        let p = self.inner.alloc_zeroed(layout);
        if !p.is_null() {
            self.stat_alloc(layout.size());
        }
        p
    }

    unsafe fn realloc(
        &self,
        ptr: *mut u8,
        layout: Layout,
        new_size: usize,
    ) -> *mut u8 {
        let p = self.inner.realloc(ptr, layout, new_size);
        if !p.is_null() {
            self.stat_free(layout.size());
            self.stat_alloc(new_size);
        }
        p
    }

    unsafe fn dealloc(
        &self,
        ptr: *mut u8,
        layout: Layout,
    ) {
        self.inner.dealloc(ptr, layout);
        self.stat_free(layout.size());
    }
}

impl Default for TrackingAlloc<System> {
    fn default() -> Self {
        Self::new()
    }
}

/// Резидентный размер процесса в байтах.
///
/// Читается из `/proc/self/statm`; на платформах без procfs возвращает 0.
pub fn resident_set_size() -> usize {
    #[cfg(target_os = "linux")]
    {
        // Второе поле statm — резидентные страницы. Размер страницы
        // принимаем 4 KiB: для целей диагностики этого достаточно.
        const PAGE_SIZE: usize = 4096;
        let Ok(statm) = std::fs::read_to_string("/proc/self/statm") else {
            return 0;
        };
        statm
            .split_whitespace()
            .nth(1)
            .and_then(|pages| pages.parse::<usize>().ok())
            .map_or(0, |pages| pages * PAGE_SIZE)
    }
    #[cfg(not(target_os = "linux"))]
    {
        0
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет учёт выделений и освобождений вручную.
    #[test]
    fn tracks_alloc_and_free() {
        let alloc = TrackingAlloc::new();
        assert_eq!(alloc.used_memory(), 0);

        let layout = Layout::from_size_align(1000, 8).unwrap();
        let p = unsafe { alloc.alloc(layout) };
        assert!(!p.is_null());
        assert_eq!(alloc.used_memory(), 1000);

        let p = unsafe { alloc.realloc(p, layout, 4000) };
        assert!(!p.is_null());
        assert_eq!(alloc.used_memory(), 4000);

        let grown = Layout::from_size_align(4000, 8).unwrap();
        unsafe { alloc.dealloc(p, grown) };
        assert_eq!(alloc.used_memory(), 0);
    }

    /// Тест проверяет округление до машинного слова.
    #[test]
    fn rounds_to_word_size() {
        let alloc = TrackingAlloc::new();
        let layout = Layout::from_size_align(3, 1).unwrap();
        let p = unsafe { alloc.alloc(layout) };
        assert_eq!(alloc.used_memory(), std::mem::size_of::<usize>());
        unsafe { alloc.dealloc(p, layout) };
        assert_eq!(alloc.used_memory(), 0);
    }

    /// Тест проверяет чтение RSS на Linux.
    #[test]
    fn rss_probe_does_not_fail() {
        let rss = resident_set_size();
        if cfg!(target_os = "linux") {
            assert!(rss > 0);
        }
    }
}
