//! The public entry points of the SQL generator.

use objstore_core::logging::translation_span;
use objstore_core::settings::DEFAULT_OFFSET_TOLERANCE;
use objstore_core::{ObjectStoreError, ObjectStoreResult, Settings};

use super::clauses::{translate, OutputShape};
use super::offset_cache::CacheKey;
use crate::metadata::Model;
use crate::platform::Platform;
use crate::query::{
    Constraint, Query, QueryEvaluable, QueryField, QueryNode, SelectItem, SimpleConstraint,
    SimpleOp,
};
use crate::value::Value;

/// Translates queries into SQL for one model and platform.
///
/// # Examples
///
/// ```
/// use objstore_sql::metadata::{AttributeType, ClassDescriptor, FieldDescriptor, Model};
/// use objstore_sql::platform::Platform;
/// use objstore_sql::query::{Query, QueryClass};
/// use objstore_sql::sql::SqlGenerator;
///
/// let model = Model::new("company", vec![ClassDescriptor::new(
///     "Employee",
///     vec![],
///     vec![FieldDescriptor::attribute("name", AttributeType::String)],
/// )]).unwrap();
/// let employee = QueryClass::new(&model, "Employee").unwrap();
/// let mut q = Query::new();
/// q.add_from(&employee).add_to_select(&employee);
///
/// let generator = SqlGenerator::new(&model, Platform::PostgreSQL);
/// assert_eq!(
///     generator.generate(&q, 0, Some(10)).unwrap(),
///     "SELECT a1_.OBJECT AS a1_, a1_.id AS a1_id FROM Employee AS a1_ ORDER BY a1_.id LIMIT 10",
/// );
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SqlGenerator<'m> {
    model: &'m Model,
    platform: Platform,
    offset_tolerance: usize,
}

impl<'m> SqlGenerator<'m> {
    /// Creates a generator with the default offset tolerance.
    pub const fn new(model: &'m Model, platform: Platform) -> Self {
        Self {
            model,
            platform,
            offset_tolerance: DEFAULT_OFFSET_TOLERANCE,
        }
    }

    /// Sets how close a cached offset must be for [`register_offset`]
    /// to reuse it instead of adding an entry.
    ///
    /// [`register_offset`]: Self::register_offset
    #[must_use]
    pub const fn with_offset_tolerance(mut self, offset_tolerance: usize) -> Self {
        self.offset_tolerance = offset_tolerance;
        self
    }

    /// Creates a generator for the platform and tolerance in `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::ConfigurationError`] for an unknown platform.
    pub fn from_settings(model: &'m Model, settings: &Settings) -> ObjectStoreResult<Self> {
        let platform: Platform = settings.platform.parse()?;
        Ok(Self::new(model, platform).with_offset_tolerance(settings.offset_tolerance))
    }

    /// The model classes are resolved against.
    pub const fn model(&self) -> &'m Model {
        self.model
    }

    /// The target platform.
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    /// The offset tolerance.
    pub const fn offset_tolerance(&self) -> usize {
        self.offset_tolerance
    }

    fn cache_key(&self) -> CacheKey {
        CacheKey {
            platform: self.platform,
            model: self.model.id(),
        }
    }

    /// Returns SQL for `limit` rows of `q` starting at row `start`
    /// (numbered from zero). `None` means no limit.
    ///
    /// The SQL is served from the query's offset cache where possible: the
    /// cached entry with the greatest offset not above `start` is extended
    /// with `LIMIT` and `OFFSET`. Without one the query is compiled and
    /// cached at offset 0. Entries compiled by a generator for another
    /// platform or model are discarded first.
    ///
    /// # Errors
    ///
    /// Returns a modeling error if a class or field is missing from the
    /// model or an object without an id is used as a value.
    pub fn generate(&self, q: &Query, start: usize, limit: Option<usize>) -> ObjectStoreResult<String> {
        let span = translation_span(OutputShape::Normal.name(), start);
        let _guard = span.enter();
        q.offset_cache().paginate(self.cache_key(), start, limit, || {
            translate(self.model, self.platform, q, None, OutputShape::Normal)
        })
    }

    /// Caches SQL for `q` that starts at row `start`, to speed up later
    /// [`generate`](Self::generate) calls with large offsets.
    ///
    /// `value` must be the value of the first ORDER BY expression at row
    /// `start - 1`; the cached SQL adds `first_order_by > value` in place of
    /// skipping `start` rows. Nothing is added if an entry already exists no
    /// more than the offset tolerance below `start`, or if `start` is 0.
    ///
    /// Failures are logged and otherwise ignored.
    pub fn register_offset(&self, q: &Query, start: usize, value: impl Into<Value>) {
        let span = translation_span(OutputShape::Normal.name(), start);
        let _guard = span.enter();

        let Some(seek) = seek_expression(q) else {
            tracing::warn!("Not registering offset {start} for query {:?}: nothing to order by", q.id());
            return;
        };
        let offset_constraint = Constraint::from(SimpleConstraint::new(
            seek,
            SimpleOp::GreaterThan,
            QueryEvaluable::Value(value.into()),
        ));
        let result = q.offset_cache().register(self.cache_key(), start, self.offset_tolerance, || {
            translate(
                self.model,
                self.platform,
                q,
                Some(&offset_constraint),
                OutputShape::Normal,
            )
        });
        match result {
            Ok(_) => {}
            Err(e) if e.is_modeling_error() => {
                tracing::warn!("Error while registering offset {start} for query {:?}: {e}", q.id());
            }
            Err(e) => {
                tracing::error!("Error while registering offset {start} for query {:?}: {e}", q.id());
            }
        }
    }
}

/// The first ORDER BY expression the generated SQL sorts on: the explicit
/// ORDER BY list, then the select list, skipping literals. A class sorts on
/// its id.
fn seek_expression(q: &Query) -> Option<QueryEvaluable> {
    q.order_by()
        .iter()
        .chain(q.select().iter().map(SelectItem::node))
        .find(|node| !node.is_value())
        .map(|node| match node {
            QueryNode::Class(qc) => QueryField::id_of(qc).into(),
            QueryNode::Evaluable(e) => e.clone(),
        })
}

/// Returns SQL fetching the single object with the given id.
///
/// At most two rows are requested so callers can detect duplicate ids.
///
/// # Errors
///
/// Returns [`ObjectStoreError::ClassNotInModel`] if the class is unknown.
///
/// # Examples
///
/// ```
/// use objstore_sql::metadata::{ClassDescriptor, Model};
/// use objstore_sql::sql::generate_query_for_id;
///
/// let model = Model::new("m", vec![ClassDescriptor::new("Employee", vec![], vec![])]).unwrap();
/// assert_eq!(
///     generate_query_for_id(42, "Employee", &model).unwrap(),
///     "SELECT DISTINCT a1_.OBJECT AS a1_ FROM Employee AS a1_ WHERE a1_.id = 42 LIMIT 2",
/// );
/// ```
pub fn generate_query_for_id(id: i64, class_name: &str, model: &Model) -> ObjectStoreResult<String> {
    let cld = model
        .class_descriptor_by_name(class_name)
        .ok_or_else(|| ObjectStoreError::ClassNotInModel(class_name.to_string()))?;
    Ok(format!(
        "SELECT DISTINCT a1_.OBJECT AS a1_ FROM {} AS a1_ WHERE a1_.id = {id} LIMIT 2",
        cld.table_name()
    ))
}
