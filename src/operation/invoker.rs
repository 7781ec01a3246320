//! Argument checking, dispatch, and result checking for operations.

use super::registry::{InvocationContext, OperationRegistry};
use super::{BoundInstance, OperationValue};
use crate::edm::{EdmModel, EntityValidation, Operation, OperationBinding, ReturnType};
use crate::error::{ODataError, ODataResult};
use http::StatusCode;
use log::{debug, warn};
use serde_json::{Map, Value};

/// Checked outcome of an invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResult {
    pub value: OperationValue,
    pub status: StatusCode,
}

/// Invokes operations against one model and registry.
#[derive(Debug, Clone, Copy)]
pub struct OperationInvoker<'a> {
    model: &'a EdmModel,
    registry: &'a OperationRegistry,
}

impl<'a> OperationInvoker<'a> {
    pub fn new(model: &'a EdmModel, registry: &'a OperationRegistry) -> Self {
        Self { model, registry }
    }

    /// Invoke `operation` with `parameters`.
    ///
    /// Status is 201 for a created entity, 204 when there is no value, and 200
    /// otherwise. Empty collections are 200.
    pub async fn invoke(
        &self,
        operation: &Operation,
        binding: Option<&BoundInstance>,
        parameters: Map<String, Value>,
        request_id: &str,
    ) -> ODataResult<InvocationResult> {
        self.check_parameters(operation, &parameters)?;
        check_binding(operation, binding)?;

        let implementation = self.registry.get(&operation.name).ok_or_else(|| {
            ODataError::NotImplemented {
                operation: operation.name.clone(),
            }
        })?;

        debug!(
            "Invoking {:?} '{}' with {} argument(s) (request: '{}')",
            operation.kind,
            operation.name,
            parameters.len(),
            request_id
        );

        let context = InvocationContext {
            operation,
            binding,
            parameters: &parameters,
            request_id,
        };
        let outcome = implementation.invoke(context).await?;

        if let Err(e) = self.check_result(operation, &outcome.value) {
            warn!(
                "Operation '{}' returned {} (request: '{}')",
                operation.name,
                outcome.value.shape(),
                request_id
            );
            return Err(e);
        }

        let status = match &outcome.value {
            OperationValue::None => StatusCode::NO_CONTENT,
            OperationValue::Entity(_) if outcome.created => StatusCode::CREATED,
            _ => StatusCode::OK,
        };
        Ok(InvocationResult {
            value: outcome.value,
            status,
        })
    }

    fn check_parameters(&self, operation: &Operation, parameters: &Map<String, Value>) -> ODataResult<()> {
        if let Some(unknown) = parameters.keys().find(|name| operation.parameter(name).is_none()) {
            return Err(ODataError::invalid_parameter(
                &operation.name,
                unknown,
                "not declared by the operation",
            ));
        }

        for parameter in &operation.parameters {
            match parameters.get(&parameter.name) {
                None if !parameter.nullable => {
                    return Err(ODataError::invalid_parameter(
                        &operation.name,
                        &parameter.name,
                        "required parameter is missing",
                    ));
                }
                None => {}
                Some(value) => self
                    .model
                    .validate_value(
                        &parameter.name,
                        &parameter.parameter_type,
                        parameter.nullable,
                        value,
                    )
                    .map_err(|e| {
                        let reason = match e {
                            ODataError::Validation { reason, .. } => reason,
                            other => other.to_string(),
                        };
                        ODataError::invalid_parameter(&operation.name, &parameter.name, reason)
                    })?,
            }
        }
        Ok(())
    }

    fn check_result(&self, operation: &Operation, value: &OperationValue) -> ODataResult<()> {
        let mismatch = |expected: String| ODataError::ResultTypeMismatch {
            operation: operation.name.clone(),
            expected,
            actual: value.shape().to_string(),
        };

        let Some(return_type) = &operation.return_type else {
            return match value {
                OperationValue::None => Ok(()),
                _ => Err(mismatch("no value".to_string())),
            };
        };
        let expected = || mismatch(return_type.to_string());

        match (return_type, value) {
            // null single value
            (
                ReturnType::Primitive(_) | ReturnType::Complex(_) | ReturnType::Entity(_),
                OperationValue::None,
            ) => Ok(()),
            (ReturnType::Primitive(kind), OperationValue::Primitive(v)) => {
                if v.is_null() {
                    Ok(())
                } else {
                    kind.validate(v).map_err(|_| expected())
                }
            }
            (ReturnType::PrimitiveCollection(kind), OperationValue::PrimitiveCollection(items)) => {
                items
                    .iter()
                    .try_for_each(|v| kind.validate(v))
                    .map_err(|_| expected())
            }
            (ReturnType::Complex(name), OperationValue::Complex(map)) => {
                let complex = self.model.resolve_complex_type(name)?;
                self.model
                    .validate_complex(name, complex, map)
                    .map_err(|_| expected())
            }
            (ReturnType::ComplexCollection(name), OperationValue::ComplexCollection(items)) => {
                let complex = self.model.resolve_complex_type(name)?;
                items
                    .iter()
                    .try_for_each(|map| self.model.validate_complex(name, complex, map))
                    .map_err(|_| expected())
            }
            (ReturnType::Entity(name), OperationValue::Entity(map)) => {
                self.check_entity(name, map).map_err(|_| expected())
            }
            (ReturnType::EntityCollection(name), OperationValue::EntityCollection(items)) => items
                .iter()
                .try_for_each(|map| self.check_entity(name, map))
                .map_err(|_| expected()),
            _ => Err(expected()),
        }
    }

    fn check_entity(&self, type_name: &str, entity: &Map<String, Value>) -> ODataResult<()> {
        let entity_type = self.model.resolve_entity_type(type_name)?;
        self.model
            .validate_entity(entity_type, entity, EntityValidation::Partial)?;
        self.model.extract_key(entity_type, entity).map(|_| ())
    }
}

fn check_binding(operation: &Operation, binding: Option<&BoundInstance>) -> ODataResult<()> {
    let matches = matches!(
        (&operation.binding, binding),
        (OperationBinding::Unbound, None)
            | (OperationBinding::Entity(_), Some(BoundInstance::Entity { .. }))
            | (
                OperationBinding::EntityCollection(_),
                Some(BoundInstance::Collection { .. })
            )
    );
    if matches {
        Ok(())
    } else {
        Err(ODataError::bad_request(format!(
            "operation '{}' cannot be invoked on this resource",
            operation.name
        )))
    }
}
