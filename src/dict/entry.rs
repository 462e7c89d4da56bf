use std::{
    hash::{BuildHasher, Hash, RandomState},
    marker::PhantomData,
    mem,
};

use super::dict_base::{Dict, DictNode, HashTable};

/// Представление одной позиции словаря: занятой или свободной.
pub enum Entry<'a, K, V, S = RandomState> {
    Occupied(OccupiedEntry<'a, K, V>),
    Vacant(VacantEntry<'a, K, V, S>),
}

/// Занятая позиция. Хранит ссылку на звено цепочки, владеющее найденным
/// узлом, поэтому изъятие работает в любом месте цепочки.
pub struct OccupiedEntry<'a, K, V> {
    pub(crate) link: &'a mut Option<Box<DictNode<K, V>>>,
    pub(crate) used: &'a mut usize,
}

/// Свободная позиция в целевом поколении таблицы.
pub struct VacantEntry<'a, K, V, S = RandomState> {
    pub(crate) key: K,
    pub(crate) slot: &'a mut Option<Box<DictNode<K, V>>>,
    pub(crate) used: &'a mut usize,
    pub(crate) _marker: PhantomData<S>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<K, V, S> Dict<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Возвращает позицию ключа для последующей модификации на месте.
    ///
    /// Как и другие модифицирующие операции, сначала выполняет один шаг
    /// рехеширования и проверку необходимости расширения.
    pub fn entry(
        &mut self,
        key: K,
    ) -> Entry<'_, K, V, S> {
        self.rehash_step_if_active();
        self.expand_if_needed();

        let hash = self.hash_key(&key);
        match self.find_coords(hash, &key) {
            Some((t, slot, pos)) => {
                let HashTable { buckets, used, .. } = &mut self.ht[t];
                let mut link = &mut buckets[slot];
                for _ in 0..pos {
                    link = &mut link.as_mut().unwrap().next;
                }
                Entry::Occupied(OccupiedEntry { link, used })
            }
            None => {
                let t = if self.is_rehashing() { 1 } else { 0 };
                let slot = (hash as usize) & self.ht[t].size_mask;
                let HashTable { buckets, used, .. } = &mut self.ht[t];
                Entry::Vacant(VacantEntry {
                    key,
                    slot: &mut buckets[slot],
                    used,
                    _marker: PhantomData,
                })
            }
        }
    }
}

impl<'a, K, V> OccupiedEntry<'a, K, V> {
    #[inline]
    pub fn key(&self) -> &K {
        &self.link.as_ref().unwrap().key
    }

    #[inline]
    pub fn get(&self) -> &V {
        &self.link.as_ref().unwrap().val
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut V {
        &mut self.link.as_mut().unwrap().val
    }

    #[inline]
    pub fn into_mut(self) -> &'a mut V {
        &mut self.link.as_mut().unwrap().val
    }

    /// Заменяет значение, возвращая старое.
    #[inline]
    pub fn insert(
        &mut self,
        val: V,
    ) -> V {
        mem::replace(&mut self.link.as_mut().unwrap().val, val)
    }

    /// Изымает узел из цепочки и возвращает его значение.
    #[inline]
    pub fn remove(self) -> V {
        let mut node = self.link.take().unwrap();

        *self.link = node.next.take();
        *self.used -= 1;
        node.val
    }
}

impl<'a, K, V, S> VacantEntry<'a, K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    #[inline]
    pub fn into_key(self) -> K {
        self.key
    }

    /// Вставляет значение в начало цепочки целевого бакета.
    pub fn insert(
        self,
        val: V,
    ) -> &'a mut V {
        let old_head = self.slot.take();

        *self.slot = Some(Box::new(DictNode {
            key: self.key,
            val,
            next: old_head,
        }));

        *self.used += 1;
        &mut self.slot.as_mut().unwrap().val
    }
}

impl<'a, K, V, S> Entry<'a, K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
    V: Default,
{
    #[inline]
    pub fn or_default(self) -> &'a mut V {
        self.or_insert_with(V::default)
    }
}

impl<'a, K, V, S> Entry<'a, K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub fn or_insert(
        self,
        default: V,
    ) -> &'a mut V {
        match self {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(default),
        }
    }

    pub fn or_insert_with(
        self,
        f: impl FnOnce() -> V,
    ) -> &'a mut V {
        match self {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(f()),
        }
    }

    pub fn or_insert_with_key(
        self,
        f: impl FnOnce(&K) -> V,
    ) -> &'a mut V {
        match self {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let val = f(&e.key);
                e.insert(val)
            }
        }
    }

    pub fn and_modify(
        self,
        f: impl FnOnce(&mut V),
    ) -> Self {
        match self {
            Entry::Occupied(mut e) => {
                f(e.get_mut());
                Entry::Occupied(e)
            }
            Entry::Vacant(e) => Entry::Vacant(e),
        }
    }

    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(e) => e.key(),
            Entry::Vacant(e) => e.key(),
        }
    }
}
