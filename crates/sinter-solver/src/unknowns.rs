//! Solver unknown vectors tagged with their layout.

use std::sync::Arc;

use sinter_types::{NodeId, ParticleId, SinterError, SinterResult};

use crate::layout::{GlobalUnknown, NodeUnknown, ParticleUnknown, UnknownLayout, NODE_UNKNOWNS};

/// Dense unknown vector sharing its [`UnknownLayout`].
///
/// Arithmetic between vectors refuses mismatched layouts.
#[derive(Debug, Clone)]
pub struct UnknownVector {
    layout: Arc<UnknownLayout>,
    values: Vec<f64>,
}

impl UnknownVector {
    /// All-zero vector.
    pub fn zeros(layout: Arc<UnknownLayout>) -> Self {
        let values = vec![0.0; layout.len()];
        Self { layout, values }
    }

    /// Wraps raw values, checking their length.
    pub fn from_values(layout: Arc<UnknownLayout>, values: Vec<f64>) -> SinterResult<Self> {
        if values.len() != layout.len() {
            return Err(SinterError::LayoutMismatch(format!(
                "layout has {} unknowns, got {} values",
                layout.len(),
                values.len()
            )));
        }
        Ok(Self { layout, values })
    }

    #[inline]
    pub fn layout(&self) -> &Arc<UnknownLayout> {
        &self.layout
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when both vectors index the same unknowns.
    pub fn same_layout(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.layout, &other.layout) || *self.layout == *other.layout
    }

    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    pub fn global(&self, kind: GlobalUnknown) -> f64 {
        self.values[self.layout.global_index(kind)]
    }

    /// Value of a particle unknown by particle slot.
    pub fn particle_at(&self, slot: usize, kind: ParticleUnknown) -> f64 {
        self.values[self.layout.particle_index_at(slot, kind)]
    }

    /// Value of a node unknown by node slot.
    pub fn node_at(&self, slot: usize, kind: NodeUnknown) -> f64 {
        self.values[self.layout.node_index_at(slot, kind)]
    }

    pub fn particle(&self, id: ParticleId, kind: ParticleUnknown) -> Option<f64> {
        self.layout.particle_index(id, kind).map(|i| self.values[i])
    }

    pub fn node(&self, id: NodeId, kind: NodeUnknown) -> Option<f64> {
        self.layout.node_index(id, kind).map(|i| self.values[i])
    }

    /// Sets a node unknown, failing if the node is not in the layout.
    pub fn set_node(&mut self, id: NodeId, kind: NodeUnknown, value: f64) -> SinterResult<()> {
        let index = self.layout.node_index(id, kind).ok_or_else(|| {
            SinterError::LayoutMismatch(format!("node {id} is not part of the layout"))
        })?;
        self.values[index] = value;
        Ok(())
    }

    /// Sets a particle unknown, failing if the particle is not in the layout.
    pub fn set_particle(
        &mut self,
        id: ParticleId,
        kind: ParticleUnknown,
        value: f64,
    ) -> SinterResult<()> {
        let index = self.layout.particle_index(id, kind).ok_or_else(|| {
            SinterError::LayoutMismatch(format!("particle {id} is not part of the layout"))
        })?;
        self.values[index] = value;
        Ok(())
    }

    /// One node unknown for every node slot, in layout order.
    pub fn node_values(&self, kind: NodeUnknown) -> impl Iterator<Item = f64> + '_ {
        self.values[self.layout.node_offset()..]
            .chunks_exact(NODE_UNKNOWNS)
            .map(move |chunk| chunk[kind.offset()])
    }

    /// Largest magnitude of a node unknown.
    pub fn max_abs_node(&self, kind: NodeUnknown) -> f64 {
        self.node_values(kind).fold(0.0, |acc, v| acc.max(v.abs()))
    }

    fn check_layout(&self, other: &Self) -> SinterResult<()> {
        if self.same_layout(other) {
            Ok(())
        } else {
            Err(SinterError::LayoutMismatch(
                "unknown vectors belong to different layouts".into(),
            ))
        }
    }

    /// `self + other`.
    pub fn try_add(&self, other: &Self) -> SinterResult<Self> {
        self.check_layout(other)?;
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a + b)
            .collect();
        Ok(Self {
            layout: Arc::clone(&self.layout),
            values,
        })
    }

    /// `self - other`.
    pub fn try_sub(&self, other: &Self) -> SinterResult<Self> {
        self.check_layout(other)?;
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a - b)
            .collect();
        Ok(Self {
            layout: Arc::clone(&self.layout),
            values,
        })
    }

    /// `factor * self`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            layout: Arc::clone(&self.layout),
            values: self.values.iter().map(|v| factor * v).collect(),
        }
    }

    /// `self += factor * other`.
    pub fn axpy(&mut self, factor: f64, other: &Self) -> SinterResult<()> {
        self.check_layout(other)?;
        for (a, b) in self.values.iter_mut().zip(&other.values) {
            *a += factor * b;
        }
        Ok(())
    }

    /// `Σ wᵢ·xᵢ` over vectors sharing one layout.
    pub fn weighted_sum(terms: &[(f64, &Self)]) -> SinterResult<Self> {
        let (_, first) = terms.first().ok_or_else(|| {
            SinterError::LayoutMismatch("weighted sum of no vectors".into())
        })?;
        let mut sum = Self::zeros(Arc::clone(&first.layout));
        for &(weight, vector) in terms {
            sum.axpy(weight, vector)?;
        }
        Ok(sum)
    }
}
