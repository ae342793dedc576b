//! The registry that owns fields, and the evaluation and assignment entry points.
use crate::basis::LagrangeBasis;
use crate::cache::{CacheState, ValueCache};
use crate::change::{ChangeBatch, ChangeFlags};
use crate::context::EvaluationContext;
use crate::error::{AssignmentError, ConstructionError, EvaluationError};
use crate::field::{
    inverse_projection, inverse_transpose, quote_name, ArithmeticOp, ElementInterpolation, Field, FieldId,
    FiniteElementParameters, LogicalOp, MatrixOp, Operator, OperatorInput, TrigonometricOp, VectorOp,
};
use crate::location::{CoordinateSystem, DomainLocation, ElementId, NodeId};
use log::{debug, trace, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MODULE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldModuleSettings {
    /// Coordinate system of new fields. If `None`, a new field takes the coordinate system
    /// of its first source, or the rectangular cartesian system if it has no sources.
    pub default_coordinate_system: Option<CoordinateSystem>,
    /// Return an existing structurally equal field instead of creating a new one.
    pub deduplicate: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct Slot {
    generation: u32,
    field: Option<Field>,
}

/// Owns a graph of fields.
///
/// Fields are created by the `create_*` factories, which validate the sources and return
/// the identifier of the new field together with one access held by the caller. A field
/// stays alive while it is accessed, by the caller or as the source of another field, or
/// while it is managed by the module.
pub struct FieldModule {
    id: u64,
    settings: FieldModuleSettings,
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    /// Live fields in creation order.
    order: Vec<FieldId>,
    names: FxHashMap<String, FieldId>,
    replace_field: Option<FieldId>,
    temp_counter: usize,
    /// Incremented by every change that can affect evaluated values.
    revision: u64,
    change_depth: usize,
    pending: ChangeBatch,
    observers: Vec<(ObserverId, Box<dyn FnMut(&ChangeBatch)>)>,
    next_observer: u64,
}

impl fmt::Debug for FieldModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldModule")
            .field("id", &self.id)
            .field("settings", &self.settings)
            .field("fields", &self.order.len())
            .field("revision", &self.revision)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for FieldModule {
    fn default() -> Self {
        Self::new()
    }
}

enum Inverse {
    Constant,
    FiniteElement,
    Identity,
    Component(usize),
    Concatenate,
    Transpose(usize),
    Projection,
    Unsupported(&'static str),
}

macro_rules! unary_factories {
    ($($name:ident => $operator:expr;)*) => {
        $(
            pub fn $name(&mut self, source: FieldId) -> Result<FieldId, ConstructionError> {
                self.create_field($operator, &[source])
            }
        )*
    };
}

macro_rules! binary_factories {
    ($($name:ident => $operator:expr;)*) => {
        $(
            pub fn $name(&mut self, first: FieldId, second: FieldId) -> Result<FieldId, ConstructionError> {
                self.create_field($operator, &[first, second])
            }
        )*
    };
}

impl FieldModule {
    pub fn new() -> Self {
        Self::with_settings(FieldModuleSettings::default())
    }

    pub fn with_settings(settings: FieldModuleSettings) -> Self {
        Self {
            id: NEXT_MODULE_ID.fetch_add(1, Ordering::Relaxed),
            settings,
            slots: Vec::new(),
            free_slots: Vec::new(),
            order: Vec::new(),
            names: FxHashMap::default(),
            replace_field: None,
            temp_counter: 0,
            revision: 0,
            change_depth: 0,
            pending: ChangeBatch::default(),
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    pub fn settings(&self) -> &FieldModuleSettings {
        &self.settings
    }

    pub fn create_evaluation_context(&self) -> EvaluationContext {
        EvaluationContext::new(self.id, self.revision)
    }

    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.field.as_ref())
    }

    fn field_mut(&mut self, id: FieldId) -> Option<&mut Field> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.field.as_mut())
    }

    fn get(&self, id: FieldId) -> Result<&Field, ConstructionError> {
        self.field(id).ok_or(ConstructionError::UnknownField(id))
    }

    fn get_mut(&mut self, id: FieldId) -> Result<&mut Field, ConstructionError> {
        self.field_mut(id).ok_or(ConstructionError::UnknownField(id))
    }

    pub fn contains(&self, id: FieldId) -> bool {
        self.field(id).is_some()
    }

    /// Identifiers of all live fields, in creation order.
    pub fn fields(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.order.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn component_count(&self, id: FieldId) -> Option<usize> {
        self.field(id).map(Field::component_count)
    }

    pub fn source_fields(&self, id: FieldId) -> Option<&[FieldId]> {
        self.field(id).map(Field::sources)
    }

    pub fn operator(&self, id: FieldId) -> Option<&Operator> {
        self.field(id).map(Field::operator)
    }

    pub fn name(&self, id: FieldId) -> Option<&str> {
        self.field(id).map(Field::name)
    }

    pub fn find_field_by_name(&self, name: &str) -> Option<FieldId> {
        self.names.get(name).copied()
    }

    pub fn set_name(&mut self, id: FieldId, name: &str) -> Result<(), ConstructionError> {
        if name.is_empty() || name.contains('"') || name.trim() != name {
            return Err(ConstructionError::InvalidName(name.to_string()));
        }
        match self.names.get(name) {
            Some(&existing) if existing == id => return Ok(()),
            Some(_) => return Err(ConstructionError::DuplicateName(name.to_string())),
            None => {}
        }
        let field = self.get_mut(id)?;
        let old_name = std::mem::replace(&mut field.name, name.to_string());
        self.names.remove(&old_name);
        self.names.insert(name.to_string(), id);
        self.record_change(id, ChangeFlags::IDENTIFIER);
        Ok(())
    }

    fn next_temp_name(&mut self) -> String {
        loop {
            self.temp_counter += 1;
            let name = format!("temp{}", self.temp_counter);
            if !self.names.contains_key(&name) {
                return name;
            }
        }
    }

    /// Sets the field whose definition is replaced by the next `create_*` call.
    ///
    /// The next factory call consumes the setting, whether or not it succeeds.
    pub fn set_replace_field(&mut self, id: Option<FieldId>) -> Result<(), ConstructionError> {
        if let Some(id) = id {
            self.get(id)?;
        }
        self.replace_field = id;
        Ok(())
    }

    pub fn replace_field(&self) -> Option<FieldId> {
        self.replace_field
    }

    pub fn coordinate_system(&self, id: FieldId) -> Option<CoordinateSystem> {
        self.field(id).map(Field::coordinate_system)
    }

    pub fn set_coordinate_system(
        &mut self,
        id: FieldId,
        coordinate_system: CoordinateSystem,
    ) -> Result<(), ConstructionError> {
        let field = self.get_mut(id)?;
        if field.coordinate_system != coordinate_system {
            field.coordinate_system = coordinate_system;
            self.record_change(id, ChangeFlags::DEFINITION);
        }
        Ok(())
    }

    /// Adds an access to the field.
    pub fn retain(&mut self, id: FieldId) -> Result<(), ConstructionError> {
        self.get_mut(id)?.access_count += 1;
        Ok(())
    }

    /// Gives up an access to the field. The field is destroyed if it is neither accessed nor
    /// managed afterwards.
    pub fn release(&mut self, id: FieldId) -> Result<(), ConstructionError> {
        if self.get(id)?.access_count == 0 {
            return Err(ConstructionError::NotAccessed(id));
        }
        self.release_access(id);
        Ok(())
    }

    pub fn is_managed(&self, id: FieldId) -> Option<bool> {
        self.field(id).map(Field::is_managed)
    }

    /// Sets whether the module keeps the field alive without accesses. Unmanaging a field
    /// without accesses destroys it.
    pub fn set_managed(&mut self, id: FieldId, managed: bool) -> Result<(), ConstructionError> {
        let field = self.get_mut(id)?;
        field.managed = managed;
        if !managed && field.access_count == 0 {
            self.destroy(id);
        }
        Ok(())
    }

    fn release_access(&mut self, id: FieldId) {
        if let Some(field) = self.field_mut(id) {
            field.access_count = field.access_count.saturating_sub(1);
            if field.access_count == 0 && !field.managed {
                self.destroy(id);
            }
        }
    }

    fn destroy(&mut self, id: FieldId) {
        let field = match self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
        {
            Some(slot) => {
                slot.generation += 1;
                slot.field.take()
            }
            None => None,
        };
        if let Some(field) = field {
            debug!("Destroying field \"{}\"", field.name);
            self.free_slots.push(id.index);
            self.names.remove(&field.name);
            self.order.retain(|&other| other != id);
            if self.replace_field == Some(id) {
                self.replace_field = None;
            }
            self.record_change(id, ChangeFlags::REMOVED);
            for source in field.sources {
                self.release_access(source);
            }
        }
    }

    /// Starts a bracket of changes. Observers are notified once the outermost bracket ends.
    pub fn begin_change(&mut self) {
        self.change_depth += 1;
    }

    pub fn end_change(&mut self) {
        if self.change_depth == 0 {
            warn!("end_change called without matching begin_change");
            return;
        }
        self.change_depth -= 1;
        if self.change_depth == 0 {
            self.flush_changes();
        }
    }

    pub fn add_observer<F>(&mut self, observer: F) -> ObserverId
    where
        F: FnMut(&ChangeBatch) + 'static,
    {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Returns whether the observer was registered.
    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        let count = self.observers.len();
        self.observers.retain(|(other, _)| *other != id);
        self.observers.len() != count
    }

    fn record_change(&mut self, id: FieldId, flags: ChangeFlags) {
        self.pending.record(id, flags);
        if flags.affects_values() || flags.contains(ChangeFlags::REMOVED) {
            self.revision += 1;
        }
        if self.change_depth == 0 {
            self.flush_changes();
        }
    }

    fn flush_changes(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let mut batch = self.pending.take();

        let changed: Vec<FieldId> = batch
            .iter()
            .filter(|&(id, flags)| flags.affects_values() && self.contains(id))
            .map(|(id, _)| id)
            .collect();
        if !changed.is_empty() {
            let mut dependents: FxHashMap<FieldId, Vec<FieldId>> = FxHashMap::default();
            for &id in &self.order {
                if let Some(field) = self.field(id) {
                    for &source in &field.sources {
                        dependents.entry(source).or_default().push(id);
                    }
                }
            }
            let mut visited: FxHashSet<FieldId> = changed.iter().copied().collect();
            let mut stack = changed;
            while let Some(id) = stack.pop() {
                for &dependent in dependents.get(&id).into_iter().flatten() {
                    batch.record(dependent, ChangeFlags::DEPENDENCY);
                    if visited.insert(dependent) {
                        stack.push(dependent);
                    }
                }
            }
        }

        for (_, observer) in self.observers.iter_mut() {
            observer(&batch);
        }
    }

    /// Whether `target` is reachable from `from` by following sources.
    fn depends_on(&self, from: FieldId, target: FieldId) -> bool {
        let mut visited = FxHashSet::default();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if visited.insert(id) {
                if let Some(field) = self.field(id) {
                    stack.extend_from_slice(&field.sources);
                }
            }
        }
        false
    }

    fn direct_dependents(&self, id: FieldId) -> Vec<FieldId> {
        self.order
            .iter()
            .copied()
            .filter(|&other| self.field(other).map_or(false, |f| f.sources.contains(&id)))
            .collect()
    }

    /// Creates a field with the given operator and sources.
    ///
    /// If a replace field is set, it takes on the new definition instead and its identifier
    /// is returned. Otherwise, if deduplication is enabled and a structurally equal field
    /// exists, that field is returned. In every case the caller holds one new access to the
    /// returned field.
    pub fn create_field(&mut self, operator: Operator, sources: &[FieldId]) -> Result<FieldId, ConstructionError> {
        let replace = self.replace_field.take();
        let source_fields = sources
            .iter()
            .map(|&id| self.get(id))
            .collect::<Result<Vec<_>, _>>()?;
        let component_count = operator.component_count(&source_fields)?;
        let coordinate_system = self
            .settings
            .default_coordinate_system
            .or_else(|| source_fields.first().map(|f| f.coordinate_system))
            .unwrap_or_default();

        if let Some(target) = replace {
            self.redefine(target, operator, sources, component_count)?;
            self.retain(target)?;
            return Ok(target);
        }

        if self.settings.deduplicate {
            let existing = self.order.iter().copied().find(|&id| {
                self.field(id)
                    .map_or(false, |f| f.operator.is_equivalent(&operator) && f.sources == sources)
            });
            if let Some(existing) = existing {
                self.retain(existing)?;
                return Ok(existing);
            }
        }

        Ok(self.insert(Field {
            name: String::new(),
            operator,
            sources: sources.to_vec(),
            component_count,
            coordinate_system,
            managed: false,
            access_count: 1,
        }))
    }

    fn insert(&mut self, mut field: Field) -> FieldId {
        if field.name.is_empty() {
            field.name = self.next_temp_name();
        }
        let index = match self.free_slots.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    field: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let id = FieldId {
            index,
            generation: slot.generation,
        };
        for &source in &field.sources {
            if let Some(source) = self.field_mut(source) {
                source.access_count += 1;
            }
        }
        self.names.insert(field.name.clone(), id);
        self.slots[index as usize].field = Some(field);
        self.order.push(id);
        self.record_change(id, ChangeFlags::ADDED);
        id
    }

    fn redefine(
        &mut self,
        target: FieldId,
        operator: Operator,
        sources: &[FieldId],
        component_count: usize,
    ) -> Result<(), ConstructionError> {
        let current = self.get(target)?;
        if sources.iter().any(|&source| self.depends_on(source, target)) {
            return Err(ConstructionError::CyclicDefinition(target));
        }

        let candidate = Field {
            name: current.name.clone(),
            operator,
            sources: sources.to_vec(),
            component_count,
            coordinate_system: current.coordinate_system,
            managed: current.managed,
            access_count: current.access_count,
        };
        for dependent in self.direct_dependents(target) {
            let field = self.get(dependent)?;
            let dependent_sources = field
                .sources
                .iter()
                .map(|&s| if s == target { Ok(&candidate) } else { self.get(s) })
                .collect::<Result<Vec<_>, _>>()?;
            match field.operator.component_count(&dependent_sources) {
                Ok(count) if count == field.component_count => {}
                _ => return Err(ConstructionError::IncompatibleReplacement { field: target, dependent }),
            }
        }

        // Retain the new sources before releasing the old ones, which may be shared
        for &source in sources {
            self.retain(source)?;
        }
        let field = self.get_mut(target)?;
        let old = std::mem::replace(field, candidate);
        debug!(
            "Replaced definition of field \"{}\": {} -> {}",
            old.name,
            old.operator.keyword(),
            field.operator.keyword()
        );
        self.record_change(target, ChangeFlags::DEFINITION);
        for source in old.sources {
            self.release_access(source);
        }
        Ok(())
    }

    /// Creates an independent field with the same definition, bypassing deduplication and
    /// the replace field.
    pub fn duplicate(&mut self, id: FieldId) -> Result<FieldId, ConstructionError> {
        let field = self.get(id)?;
        let copy = Field {
            name: String::new(),
            operator: field.operator.clone(),
            sources: field.sources.clone(),
            component_count: field.component_count,
            coordinate_system: field.coordinate_system,
            managed: false,
            access_count: 1,
        };
        Ok(self.insert(copy))
    }

    /// Structural equality: same operator and parameters applied to the same sources.
    ///
    /// Every field equals itself, but distinct finite element fields are never equal.
    pub fn compare(&self, first: FieldId, second: FieldId) -> bool {
        if first == second {
            return self.contains(first);
        }
        match (self.field(first), self.field(second)) {
            (Some(a), Some(b)) => a.operator.is_equivalent(&b.operator) && a.sources == b.sources,
            _ => false,
        }
    }

    /// The command that reconstructs the field from its sources, e.g.
    /// `matrix_multiply number_of_rows 2 fields a b`.
    pub fn describe(&self, id: FieldId) -> Option<String> {
        let field = self.field(id)?;
        let names: Vec<String> = field
            .sources
            .iter()
            .map(|&source| self.name(source).map(quote_name))
            .collect::<Option<_>>()?;
        Some(field.operator.describe(&names))
    }

    pub fn create_constant(&mut self, values: &[f64]) -> Result<FieldId, ConstructionError> {
        self.create_field(Operator::Constant(values.to_vec()), &[])
    }

    /// Creates a finite element field without any node values or element interpolations.
    pub fn create_finite_element(&mut self, component_count: usize) -> Result<FieldId, ConstructionError> {
        self.create_field(
            Operator::FiniteElement(FiniteElementParameters::new(component_count)),
            &[],
        )
    }

    pub fn create_xi_coordinates(&mut self) -> Result<FieldId, ConstructionError> {
        self.create_field(Operator::XiCoordinates, &[])
    }

    pub fn create_time_value(&mut self) -> Result<FieldId, ConstructionError> {
        self.create_field(Operator::TimeValue, &[])
    }

    /// Extracts a single component, counted from zero.
    pub fn create_component(&mut self, source: FieldId, component: usize) -> Result<FieldId, ConstructionError> {
        self.create_field(Operator::Component(component), &[source])
    }

    pub fn create_concatenate(&mut self, sources: &[FieldId]) -> Result<FieldId, ConstructionError> {
        self.create_field(Operator::Concatenate, sources)
    }

    /// Derivative of `source` with respect to reference coordinate `xi_index`. Evaluating it
    /// requires derivatives to be requested by the context.
    pub fn create_derivative(&mut self, source: FieldId, xi_index: usize) -> Result<FieldId, ConstructionError> {
        self.create_field(Operator::Derivative { xi_index }, &[source])
    }

    pub fn create_if(
        &mut self,
        condition: FieldId,
        if_true: FieldId,
        if_false: FieldId,
    ) -> Result<FieldId, ConstructionError> {
        self.create_field(Operator::If, &[condition, if_true, if_false])
    }

    pub fn create_matrix_multiply(
        &mut self,
        number_of_rows: usize,
        first: FieldId,
        second: FieldId,
    ) -> Result<FieldId, ConstructionError> {
        self.create_field(Operator::Matrix(MatrixOp::MatrixMultiply { number_of_rows }), &[first, second])
    }

    pub fn create_projection(&mut self, source: FieldId, projection_matrix: FieldId) -> Result<FieldId, ConstructionError> {
        self.create_field(Operator::Matrix(MatrixOp::Projection), &[source, projection_matrix])
    }

    pub fn create_transpose(
        &mut self,
        source_number_of_rows: usize,
        source: FieldId,
    ) -> Result<FieldId, ConstructionError> {
        self.create_field(
            Operator::Matrix(MatrixOp::Transpose { source_number_of_rows }),
            &[source],
        )
    }

    unary_factories! {
        create_identity => Operator::Identity;
        create_sum_components => Operator::Arithmetic(ArithmeticOp::SumComponents);
        create_log => Operator::Arithmetic(ArithmeticOp::Log);
        create_sqrt => Operator::Arithmetic(ArithmeticOp::Sqrt);
        create_exp => Operator::Arithmetic(ArithmeticOp::Exp);
        create_abs => Operator::Arithmetic(ArithmeticOp::Abs);
        create_sin => Operator::Trigonometric(TrigonometricOp::Sin);
        create_cos => Operator::Trigonometric(TrigonometricOp::Cos);
        create_tan => Operator::Trigonometric(TrigonometricOp::Tan);
        create_asin => Operator::Trigonometric(TrigonometricOp::Asin);
        create_acos => Operator::Trigonometric(TrigonometricOp::Acos);
        create_atan => Operator::Trigonometric(TrigonometricOp::Atan);
        create_not => Operator::Logical(LogicalOp::Not);
        create_magnitude => Operator::Vector(VectorOp::Magnitude);
        create_normalise => Operator::Vector(VectorOp::Normalise);
        create_determinant => Operator::Matrix(MatrixOp::Determinant);
        create_eigenvalues => Operator::Matrix(MatrixOp::Eigenvalues);
        create_eigenvectors => Operator::Matrix(MatrixOp::Eigenvectors);
        create_matrix_invert => Operator::Matrix(MatrixOp::MatrixInvert);
        create_quaternion_to_matrix => Operator::Matrix(MatrixOp::QuaternionToMatrix);
        create_matrix_to_quaternion => Operator::Matrix(MatrixOp::MatrixToQuaternion);
    }

    binary_factories! {
        create_add => Operator::Arithmetic(ArithmeticOp::Add);
        create_subtract => Operator::Arithmetic(ArithmeticOp::Subtract);
        create_multiply => Operator::Arithmetic(ArithmeticOp::Multiply);
        create_divide => Operator::Arithmetic(ArithmeticOp::Divide);
        create_power => Operator::Arithmetic(ArithmeticOp::Power);
        create_atan2 => Operator::Trigonometric(TrigonometricOp::Atan2);
        create_and => Operator::Logical(LogicalOp::And);
        create_or => Operator::Logical(LogicalOp::Or);
        create_xor => Operator::Logical(LogicalOp::Xor);
        create_equal_to => Operator::Logical(LogicalOp::EqualTo);
        create_greater_than => Operator::Logical(LogicalOp::GreaterThan);
        create_less_than => Operator::Logical(LogicalOp::LessThan);
        create_dot_product => Operator::Vector(VectorOp::DotProduct);
        create_cross_product => Operator::Vector(VectorOp::CrossProduct);
    }

    pub fn finite_element_parameters(&self, id: FieldId) -> Option<&FiniteElementParameters> {
        match self.operator(id) {
            Some(Operator::FiniteElement(parameters)) => Some(parameters),
            _ => None,
        }
    }

    fn finite_element_parameters_mut(&mut self, id: FieldId) -> Result<&mut FiniteElementParameters, ConstructionError> {
        match &mut self.get_mut(id)?.operator {
            Operator::FiniteElement(parameters) => Ok(parameters),
            _ => Err(ConstructionError::NotFiniteElement(id)),
        }
    }

    pub fn set_node_parameters(&mut self, id: FieldId, node: NodeId, values: &[f64]) -> Result<(), ConstructionError> {
        self.finite_element_parameters_mut(id)?
            .set_node_values(node, values)?;
        self.record_change(id, ChangeFlags::VALUES);
        Ok(())
    }

    pub fn set_node_component(
        &mut self,
        id: FieldId,
        node: NodeId,
        component: usize,
        value: f64,
    ) -> Result<(), ConstructionError> {
        self.finite_element_parameters_mut(id)?
            .set_node_component(node, component, value)?;
        self.record_change(id, ChangeFlags::VALUES);
        Ok(())
    }

    /// Interpolates one component, or all components if `component` is `None`, over the
    /// element with the given basis. `nodes` lists the node of each basis function.
    pub fn define_element(
        &mut self,
        id: FieldId,
        element: ElementId,
        component: Option<usize>,
        basis: LagrangeBasis,
        nodes: &[NodeId],
    ) -> Result<(), ConstructionError> {
        let interpolation = ElementInterpolation {
            basis,
            nodes: nodes.to_vec(),
        };
        self.finite_element_parameters_mut(id)?
            .define_element(element, component, interpolation)?;
        self.record_change(id, ChangeFlags::VALUES);
        Ok(())
    }

    /// Removes the field from the element. Returns whether it was defined there.
    pub fn undefine_element(&mut self, id: FieldId, element: ElementId) -> Result<bool, ConstructionError> {
        let removed = self.finite_element_parameters_mut(id)?.undefine_element(element);
        if removed {
            self.record_change(id, ChangeFlags::VALUES);
        }
        Ok(removed)
    }

    fn prepare_context(&self, ctx: &mut EvaluationContext) -> Result<(), EvaluationError> {
        if ctx.module_id != self.id {
            return Err(EvaluationError::ForeignContext);
        }
        ctx.synchronize(self.revision, |id| self.contains(id));
        Ok(())
    }

    /// Evaluates the field at the current location of the context.
    ///
    /// Sources are evaluated first, each at most once per generation of the context.
    pub fn evaluate<'c>(
        &self,
        ctx: &'c mut EvaluationContext,
        id: FieldId,
    ) -> Result<&'c ValueCache, EvaluationError> {
        self.prepare_context(ctx)?;
        self.evaluate_field(ctx, id)?;
        let ctx: &'c EvaluationContext = ctx;
        ctx.cache(id).ok_or(EvaluationError::UnknownField(id))
    }

    /// The cache of a field in the context, if it holds the outcome of evaluating the field
    /// at the current location of the context against the current definitions.
    ///
    /// Caches computed before the last change of location or of any definition are not
    /// returned.
    pub fn cache<'c>(&self, ctx: &'c EvaluationContext, id: FieldId) -> Option<&'c ValueCache> {
        if ctx.module_id != self.id || ctx.seen_revision != self.revision || !self.contains(id) {
            return None;
        }
        ctx.cache(id)
            .filter(|cache| cache.state().generation() == Some(ctx.generation()))
    }

    pub fn evaluate_real(&self, ctx: &mut EvaluationContext, id: FieldId) -> Result<Vec<f64>, EvaluationError> {
        Ok(self.evaluate(ctx, id)?.values().to_vec())
    }

    /// Evaluates values and derivatives with respect to the reference coordinates.
    ///
    /// Fails if derivatives are not requested by the context or can not be computed for the
    /// field.
    pub fn evaluate_with_derivatives(
        &self,
        ctx: &mut EvaluationContext,
        id: FieldId,
    ) -> Result<(Vec<f64>, Vec<f64>), EvaluationError> {
        let cache = self.evaluate(ctx, id)?;
        let derivatives = cache
            .derivatives()
            .ok_or(EvaluationError::DerivativesUnavailable(id))?;
        Ok((cache.values().to_vec(), derivatives.to_vec()))
    }

    fn evaluate_field(&self, ctx: &mut EvaluationContext, id: FieldId) -> Result<(), EvaluationError> {
        let field = self.field(id).ok_or(EvaluationError::UnknownField(id))?;
        let generation = ctx.generation();
        let cache = ctx
            .caches
            .entry(id)
            .or_insert_with(|| ValueCache::new(field.component_count));
        match cache.state() {
            CacheState::Valid(g) if *g == generation => return Ok(()),
            CacheState::Computing(g) if *g == generation => return Err(EvaluationError::CyclicDependency(id)),
            CacheState::Failed(g, error) if *g == generation => return Err(error.clone()),
            _ => {}
        }
        cache.set_state(CacheState::Computing(generation));

        let result = field
            .sources
            .iter()
            .try_for_each(|&source| self.evaluate_field(ctx, source))
            .and_then(|()| self.compute(ctx, id, field));

        let state = match &result {
            Ok(()) => CacheState::Valid(generation),
            Err(error) => CacheState::Failed(generation, error.clone()),
        };
        if let Some(cache) = ctx.caches.get_mut(&id) {
            cache.set_state(state);
        }
        result
    }

    fn compute(&self, ctx: &mut EvaluationContext, id: FieldId, field: &Field) -> Result<(), EvaluationError> {
        let number_of_xi = if field.operator.supports_derivatives() {
            ctx.number_of_xi()
        } else {
            0
        };
        let mut cache = ctx
            .caches
            .remove(&id)
            .unwrap_or_else(|| ValueCache::new(field.component_count));
        cache.prepare(field.component_count, number_of_xi);

        let result = field
            .sources
            .iter()
            .map(|source| {
                ctx.caches
                    .get(source)
                    .ok_or(EvaluationError::MissingIntermediate(id))
            })
            .collect::<Result<Vec<_>, _>>()
            .and_then(|sources| {
                let input = OperatorInput {
                    field: id,
                    sources,
                    location: ctx.location(),
                    number_of_xi,
                };
                field.operator.evaluate(&input, &mut cache)
            });
        trace!(
            "Computed field \"{}\" ({}) in generation {}: {}",
            field.name,
            field.operator.keyword(),
            ctx.generation(),
            if result.is_ok() { "ok" } else { "failed" }
        );

        ctx.caches.insert(id, cache);
        result
    }

    fn evaluate_values(&self, ctx: &mut EvaluationContext, id: FieldId) -> Result<Vec<f64>, EvaluationError> {
        self.evaluate_real(ctx, id)
    }

    /// Sets the values of the field at the current location by inverting its operator,
    /// ultimately assigning to constant or finite element fields.
    pub fn assign_real(
        &mut self,
        ctx: &mut EvaluationContext,
        id: FieldId,
        values: &[f64],
    ) -> Result<(), AssignmentError> {
        if ctx.module_id != self.id {
            return Err(AssignmentError::ForeignContext);
        }
        self.begin_change();
        let result = self.assign_field(ctx, id, values);
        self.end_change();
        result
    }

    fn assign_field(
        &mut self,
        ctx: &mut EvaluationContext,
        id: FieldId,
        values: &[f64],
    ) -> Result<(), AssignmentError> {
        let field = self.field(id).ok_or(AssignmentError::UnknownField(id))?;
        if values.len() != field.component_count {
            return Err(AssignmentError::WrongValueCount {
                expected: field.component_count,
                actual: values.len(),
            });
        }
        let sources = field.sources.clone();
        let inverse = match &field.operator {
            Operator::Constant(_) => Inverse::Constant,
            Operator::FiniteElement(_) => Inverse::FiniteElement,
            Operator::Identity => Inverse::Identity,
            &Operator::Component(component) => Inverse::Component(component),
            Operator::Concatenate => Inverse::Concatenate,
            &Operator::Matrix(MatrixOp::Transpose { source_number_of_rows }) => {
                Inverse::Transpose(source_number_of_rows)
            }
            Operator::Matrix(MatrixOp::Projection) => Inverse::Projection,
            other => Inverse::Unsupported(other.keyword()),
        };

        match inverse {
            Inverse::Constant => {
                if let Some(Operator::Constant(stored)) = self.field_mut(id).map(|f| &mut f.operator) {
                    stored.copy_from_slice(values);
                }
                self.record_change(id, ChangeFlags::VALUES);
                Ok(())
            }
            Inverse::FiniteElement => match ctx.location().domain {
                DomainLocation::Node(node) => {
                    if let Ok(parameters) = self.finite_element_parameters_mut(id) {
                        parameters
                            .set_node_values(node, values)
                            .map_err(|_| AssignmentError::WrongValueCount {
                                expected: parameters.component_count(),
                                actual: values.len(),
                            })?;
                    }
                    self.record_change(id, ChangeFlags::VALUES);
                    Ok(())
                }
                _ => Err(AssignmentError::UnsupportedLocation(id)),
            },
            Inverse::Identity => self.assign_field(ctx, sources[0], values),
            Inverse::Component(component) => {
                let mut source_values = self.evaluate_values(ctx, sources[0])?;
                source_values[component] = values[0];
                self.assign_field(ctx, sources[0], &source_values)
            }
            Inverse::Concatenate => {
                let mut offset = 0;
                for source in sources {
                    let count = self
                        .component_count(source)
                        .ok_or(AssignmentError::UnknownField(source))?;
                    self.assign_field(ctx, source, &values[offset..offset + count])?;
                    offset += count;
                }
                Ok(())
            }
            Inverse::Transpose(source_number_of_rows) => {
                let source_values = inverse_transpose(source_number_of_rows, values);
                self.assign_field(ctx, sources[0], &source_values)
            }
            Inverse::Projection => {
                if self.component_count(sources[0]) != Some(3) || self.component_count(sources[1]) != Some(16) {
                    return Err(AssignmentError::UnsupportedShape { operator: "projection" });
                }
                let matrix = self.evaluate_values(ctx, sources[1])?;
                let point = inverse_projection(values, &matrix)?;
                self.assign_field(ctx, sources[0], &point)
            }
            Inverse::Unsupported(operator) => Err(AssignmentError::NotSupported { operator }),
        }
    }
}
