//! Columnar component storage.
//!
//! Each non-tag component type owns one [`ColumnStore`]. Storage is laid out
//! column-wise: one contiguous typed buffer ("lane") per scalar element type
//! appearing in the schema, shared by every field of that element type. A
//! field occupies a fixed sub-range of its lane's per-entity stride, assigned
//! by a cursor when the store is built, so entity `e`'s values for a field
//! live at `e * stride + offset .. + width`.
//!
//! Invariant: every lane's length is exactly `capacity * stride`. Growth
//! reallocates and copies; because rows are entity-major, a plain prefix-
//! preserving resize keeps all existing values at their original offsets.

use crate::schema::{ComponentSchema, FieldKind, ScalarType};

/// Where a field lives inside its store: which lane, and the per-entity
/// offset and width within that lane's stride. Computed once at
/// registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSlot {
    pub lane: usize,
    pub offset: usize,
    pub width: usize,
}

/// Typed backing buffer for one scalar element type.
#[derive(Debug, Clone, PartialEq)]
enum LaneData {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl LaneData {
    fn zeroed(elem: ScalarType, len: usize) -> Self {
        match elem {
            ScalarType::I8 => LaneData::I8(vec![0; len]),
            ScalarType::U8 => LaneData::U8(vec![0; len]),
            ScalarType::I16 => LaneData::I16(vec![0; len]),
            ScalarType::U16 => LaneData::U16(vec![0; len]),
            ScalarType::I32 => LaneData::I32(vec![0; len]),
            ScalarType::U32 | ScalarType::EntityRef => LaneData::U32(vec![0; len]),
            ScalarType::F32 => LaneData::F32(vec![0.0; len]),
            ScalarType::F64 => LaneData::F64(vec![0.0; len]),
        }
    }

    fn resize(&mut self, len: usize) {
        match self {
            LaneData::I8(v) => v.resize(len, 0),
            LaneData::U8(v) => v.resize(len, 0),
            LaneData::I16(v) => v.resize(len, 0),
            LaneData::U16(v) => v.resize(len, 0),
            LaneData::I32(v) => v.resize(len, 0),
            LaneData::U32(v) => v.resize(len, 0),
            LaneData::F32(v) => v.resize(len, 0.0),
            LaneData::F64(v) => v.resize(len, 0.0),
        }
    }

    fn zero_range(&mut self, start: usize, end: usize) {
        match self {
            LaneData::I8(v) => v[start..end].fill(0),
            LaneData::U8(v) => v[start..end].fill(0),
            LaneData::I16(v) => v[start..end].fill(0),
            LaneData::U16(v) => v[start..end].fill(0),
            LaneData::I32(v) => v[start..end].fill(0),
            LaneData::U32(v) => v[start..end].fill(0),
            LaneData::F32(v) => v[start..end].fill(0.0),
            LaneData::F64(v) => v[start..end].fill(0.0),
        }
    }

    fn range_eq(&self, other: &LaneData, start: usize, end: usize) -> bool {
        match (self, other) {
            (LaneData::I8(a), LaneData::I8(b)) => a[start..end] == b[start..end],
            (LaneData::U8(a), LaneData::U8(b)) => a[start..end] == b[start..end],
            (LaneData::I16(a), LaneData::I16(b)) => a[start..end] == b[start..end],
            (LaneData::U16(a), LaneData::U16(b)) => a[start..end] == b[start..end],
            (LaneData::I32(a), LaneData::I32(b)) => a[start..end] == b[start..end],
            (LaneData::U32(a), LaneData::U32(b)) => a[start..end] == b[start..end],
            (LaneData::F32(a), LaneData::F32(b)) => a[start..end] == b[start..end],
            (LaneData::F64(a), LaneData::F64(b)) => a[start..end] == b[start..end],
            _ => false,
        }
    }

    fn copy_range_from(&mut self, other: &LaneData, start: usize, end: usize) {
        match (self, other) {
            (LaneData::I8(a), LaneData::I8(b)) => a[start..end].copy_from_slice(&b[start..end]),
            (LaneData::U8(a), LaneData::U8(b)) => a[start..end].copy_from_slice(&b[start..end]),
            (LaneData::I16(a), LaneData::I16(b)) => a[start..end].copy_from_slice(&b[start..end]),
            (LaneData::U16(a), LaneData::U16(b)) => a[start..end].copy_from_slice(&b[start..end]),
            (LaneData::I32(a), LaneData::I32(b)) => a[start..end].copy_from_slice(&b[start..end]),
            (LaneData::U32(a), LaneData::U32(b)) => a[start..end].copy_from_slice(&b[start..end]),
            (LaneData::F32(a), LaneData::F32(b)) => a[start..end].copy_from_slice(&b[start..end]),
            (LaneData::F64(a), LaneData::F64(b)) => a[start..end].copy_from_slice(&b[start..end]),
            _ => {}
        }
    }
}

/// One typed buffer shared by all fields of a single element type.
#[derive(Debug, Clone)]
struct Lane {
    elem: ScalarType,
    stride: usize,
    data: LaneData,
}

/// Scalar types that can be read from and written to a store lane.
///
/// Sealed over the eight numeric lane types; entity references read and
/// write through `u32`.
pub trait LaneScalar: Copy + Default + PartialEq + private::Sealed {
    /// The lane this scalar type maps to.
    const LANE: ScalarType;
    #[doc(hidden)]
    fn lane_slice(store: &ColumnStore, lane: usize) -> Option<&[Self]>;
    #[doc(hidden)]
    fn lane_slice_mut(store: &mut ColumnStore, lane: usize) -> Option<&mut [Self]>;
}

mod private {
    pub trait Sealed {}
}

macro_rules! impl_lane_scalar {
    ($ty:ty, $lane:ident) => {
        impl private::Sealed for $ty {}
        impl LaneScalar for $ty {
            const LANE: ScalarType = ScalarType::$lane;
            fn lane_slice(store: &ColumnStore, lane: usize) -> Option<&[Self]> {
                match &store.lanes.get(lane)?.data {
                    LaneData::$lane(v) => Some(v),
                    _ => None,
                }
            }
            fn lane_slice_mut(store: &mut ColumnStore, lane: usize) -> Option<&mut [Self]> {
                match &mut store.lanes.get_mut(lane)?.data {
                    LaneData::$lane(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_lane_scalar!(i8, I8);
impl_lane_scalar!(u8, U8);
impl_lane_scalar!(i16, I16);
impl_lane_scalar!(u16, U16);
impl_lane_scalar!(i32, I32);
impl_lane_scalar!(u32, U32);
impl_lane_scalar!(f32, F32);
impl_lane_scalar!(f64, F64);

/// Columnar backing storage for one component type.
///
/// Tag components build an empty store with no lanes; all operations on it
/// are no-ops.
#[derive(Debug, Clone)]
pub struct ColumnStore {
    lanes: Vec<Lane>,
    capacity: usize,
}

impl ColumnStore {
    /// Build storage for a schema, sized to `capacity` entities.
    ///
    /// Fields of the same element type are packed into one shared lane;
    /// each field's [`FieldSlot`] is returned in schema field order.
    #[must_use]
    pub fn new(schema: &ComponentSchema, capacity: usize) -> (Self, Vec<FieldSlot>) {
        let mut lanes: Vec<Lane> = Vec::new();
        let mut slots = Vec::with_capacity(schema.fields.len());

        for field in &schema.fields {
            let elem = field.kind.elem().lane();
            let width = field.kind.width();
            let lane_idx = match lanes.iter().position(|l| l.elem == elem) {
                Some(i) => i,
                None => {
                    lanes.push(Lane {
                        elem,
                        stride: 0,
                        data: LaneData::zeroed(elem, 0),
                    });
                    lanes.len() - 1
                }
            };
            let offset = lanes[lane_idx].stride;
            lanes[lane_idx].stride += width;
            slots.push(FieldSlot {
                lane: lane_idx,
                offset,
                width,
            });
        }

        for lane in &mut lanes {
            lane.data = LaneData::zeroed(lane.elem, capacity * lane.stride);
        }

        (Self { lanes, capacity }, slots)
    }

    /// Current entity capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Grow (or shrink) every lane to hold `new_capacity` entities,
    /// preserving existing values at their original entity offsets.
    pub fn resize(&mut self, new_capacity: usize) {
        for lane in &mut self.lanes {
            lane.data.resize(new_capacity * lane.stride);
        }
        self.capacity = new_capacity;
    }

    /// Zero every field's storage for one entity row.
    pub fn reset_slot(&mut self, row: usize) {
        if row >= self.capacity {
            return;
        }
        for lane in &mut self.lanes {
            lane.data.zero_range(row * lane.stride, (row + 1) * lane.stride);
        }
    }

    /// Read a field's values for one entity. Returns a one-element slice
    /// for scalar fields.
    #[must_use]
    pub fn slice<T: LaneScalar>(&self, slot: FieldSlot, row: usize) -> Option<&[T]> {
        if row >= self.capacity {
            return None;
        }
        let stride = self.lanes.get(slot.lane)?.stride;
        let base = row * stride + slot.offset;
        T::lane_slice(self, slot.lane).map(|v| &v[base..base + slot.width])
    }

    /// Mutable access to a field's values for one entity.
    #[must_use]
    pub fn slice_mut<T: LaneScalar>(&mut self, slot: FieldSlot, row: usize) -> Option<&mut [T]> {
        if row >= self.capacity {
            return None;
        }
        let stride = self.lanes.get(slot.lane)?.stride;
        let base = row * stride + slot.offset;
        T::lane_slice_mut(self, slot.lane).map(|v| &mut v[base..base + slot.width])
    }

    /// Read a scalar field value for one entity.
    #[must_use]
    pub fn get<T: LaneScalar>(&self, slot: FieldSlot, row: usize) -> Option<T> {
        self.slice::<T>(slot, row).map(|s| s[0])
    }

    /// Write a scalar field value for one entity. Returns `false` when the
    /// slot/row does not resolve.
    pub fn set<T: LaneScalar>(&mut self, slot: FieldSlot, row: usize, value: T) -> bool {
        match self.slice_mut::<T>(slot, row) {
            Some(s) => {
                s[0] = value;
                true
            }
            None => false,
        }
    }

    /// Compare one entity's row against the same row in another store with
    /// identical layout. Used by shadow-copy change detection.
    #[must_use]
    pub fn row_eq(&self, other: &ColumnStore, row: usize) -> bool {
        self.lanes.iter().zip(&other.lanes).all(|(a, b)| {
            a.data
                .range_eq(&b.data, row * a.stride, (row + 1) * a.stride)
        })
    }

    /// Copy one entity's row from another store with identical layout.
    pub fn copy_row_from(&mut self, other: &ColumnStore, row: usize) {
        for (a, b) in self.lanes.iter_mut().zip(&other.lanes) {
            let stride = a.stride;
            a.data.copy_range_from(&b.data, row * stride, (row + 1) * stride);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ComponentSchema;

    fn position_store(capacity: usize) -> (ColumnStore, Vec<FieldSlot>) {
        let schema = ComponentSchema::new("position")
            .field("x", ScalarType::F32)
            .field("y", ScalarType::F32);
        ColumnStore::new(&schema, capacity)
    }

    #[test]
    fn test_same_type_fields_share_a_lane() {
        let (store, slots) = position_store(4);
        assert_eq!(store.lanes.len(), 1);
        assert_eq!(slots[0], FieldSlot { lane: 0, offset: 0, width: 1 });
        assert_eq!(slots[1], FieldSlot { lane: 0, offset: 1, width: 1 });
    }

    #[test]
    fn test_mixed_types_get_separate_lanes() {
        let schema = ComponentSchema::new("device")
            .field("kind", ScalarType::U8)
            .field("heat", ScalarType::F32)
            .array("links", ScalarType::EntityRef, 4)
            .field("owner", ScalarType::EntityRef);
        let (store, slots) = ColumnStore::new(&schema, 2);
        // u8, f32, u32 (EntityRef folds into the u32 lane).
        assert_eq!(store.lanes.len(), 3);
        assert_eq!(slots[2], FieldSlot { lane: 2, offset: 0, width: 4 });
        assert_eq!(slots[3], FieldSlot { lane: 2, offset: 4, width: 1 });
    }

    #[test]
    fn test_set_and_get_scalar() {
        let (mut store, slots) = position_store(4);
        assert!(store.set::<f32>(slots[0], 2, 7.5));
        assert_eq!(store.get::<f32>(slots[0], 2), Some(7.5));
        assert_eq!(store.get::<f32>(slots[1], 2), Some(0.0));
        // Wrong lane type resolves to nothing.
        assert_eq!(store.get::<u32>(slots[0], 2), None);
    }

    #[test]
    fn test_out_of_range_row() {
        let (mut store, slots) = position_store(4);
        assert!(!store.set::<f32>(slots[0], 4, 1.0));
        assert_eq!(store.get::<f32>(slots[0], 4), None);
    }

    #[test]
    fn test_resize_preserves_values_at_original_offsets() {
        let (mut store, slots) = position_store(2);
        store.set::<f32>(slots[0], 0, 1.0);
        store.set::<f32>(slots[1], 0, 2.0);
        store.set::<f32>(slots[0], 1, 3.0);
        store.resize(8);
        assert_eq!(store.capacity(), 8);
        assert_eq!(store.get::<f32>(slots[0], 0), Some(1.0));
        assert_eq!(store.get::<f32>(slots[1], 0), Some(2.0));
        assert_eq!(store.get::<f32>(slots[0], 1), Some(3.0));
        assert_eq!(store.get::<f32>(slots[0], 7), Some(0.0));
    }

    #[test]
    fn test_reset_slot_zeroes_one_row_only() {
        let (mut store, slots) = position_store(4);
        store.set::<f32>(slots[0], 1, 5.0);
        store.set::<f32>(slots[0], 2, 6.0);
        store.reset_slot(1);
        assert_eq!(store.get::<f32>(slots[0], 1), Some(0.0));
        assert_eq!(store.get::<f32>(slots[0], 2), Some(6.0));
    }

    #[test]
    fn test_array_slice_access() {
        let schema = ComponentSchema::new("path").array("waypoints", ScalarType::F32, 3);
        let (mut store, slots) = ColumnStore::new(&schema, 2);
        store
            .slice_mut::<f32>(slots[0], 1)
            .unwrap()
            .copy_from_slice(&[1.0, 2.0, 3.0]);
        assert_eq!(store.slice::<f32>(slots[0], 1).unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(store.slice::<f32>(slots[0], 0).unwrap(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_row_eq_and_copy_row() {
        let (mut live, slots) = position_store(4);
        let (mut shadow, _) = position_store(4);
        assert!(live.row_eq(&shadow, 0));
        live.set::<f32>(slots[0], 0, 9.0);
        assert!(!live.row_eq(&shadow, 0));
        shadow.copy_row_from(&live, 0);
        assert!(live.row_eq(&shadow, 0));
    }

    #[test]
    fn test_tag_store_is_empty() {
        let schema = ComponentSchema::tag("renderable");
        let (mut store, slots) = ColumnStore::new(&schema, 16);
        assert!(slots.is_empty());
        assert!(store.lanes.is_empty());
        store.reset_slot(3);
        store.resize(32);
    }
}
