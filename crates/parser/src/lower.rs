//! Name resolution, type checking and lowering of the surface syntax into the contract IR.

use crate::{
    ast::{self, ClassDef, ExprKind as Syn, FunctionDef, Member, StmtKind, UnaryOperator},
    config::AnalyzerConfig,
    error::{AnalysisError, Result},
};
use alloy_primitives::U256;
use cobra_data::{
    BinaryOp, Constructor, ContractDefinition, EventDeclaration, EventId, Expr, ExprKind, FieldId,
    Function, FunctionSignature, IndexVec, InterfaceType, Local, LocalId, Mutability, Param,
    SourceLocation, StateField, Stmt, StorageLayout, UnaryOp,
};
use std::collections::{HashMap, HashSet};

const INIT: &str = "__init__";

pub fn lower_contract(class: &ClassDef, config: &AnalyzerConfig) -> Result<ContractDefinition> {
    let mut declared: HashMap<&str, SourceLocation> = HashMap::new();
    let mut field_decls = Vec::new();
    let mut event_defs = Vec::new();
    let mut method_defs = Vec::new();
    let mut init_def = None;

    for member in &class.members {
        let (name, location) = match member {
            Member::Field(field) => (field.name.as_str(), field.location),
            Member::Method(method) => (method.name.as_str(), method.location),
            Member::Unsupported(unsupported, location) => return Err(unsupported.error(*location)),
        };
        if let Some(first) = declared.insert(name, location) {
            return Err(AnalysisError::semantic(
                format!("`{name}` is declared twice (first declaration at {first})"),
                location,
            ));
        }
        match member {
            Member::Field(field) => field_decls.push(field),
            Member::Method(method) if method.name == INIT => init_def = Some(method),
            Member::Method(method) if method.decorators.iter().any(|d| d.name == "event") => {
                event_defs.push(method)
            }
            Member::Method(method) => method_defs.push(method),
            Member::Unsupported(..) => {}
        }
    }

    if method_defs.len() > config.max_functions {
        return Err(AnalysisError::unsupported(
            "function limit",
            format!(
                "contract declares {} functions, at most {} are allowed",
                method_defs.len(),
                config.max_functions
            ),
            method_defs[config.max_functions].location,
        ));
    }

    let mut layout = StorageLayout::new();
    let mut fields = IndexVec::new();
    for decl in &field_decls {
        let Some(annotation) = &decl.annotation else {
            return Err(AnalysisError::semantic(
                format!("field `{}` needs a type annotation", decl.name),
                decl.location,
            ));
        };
        let ty = resolve_type(annotation)?;
        check_storage_type(&decl.name, &ty, annotation.location)?;
        let slot = layout.allocate_span(&decl.name, ty.slot_span());
        log::trace!("field `{}` ({ty}) at slot {slot}", decl.name);
        fields.push(StateField { name: decl.name.clone(), ty, slot, location: decl.location });
    }

    let mut events = IndexVec::new();
    for def in &event_defs {
        events.push(lower_event(def)?);
    }

    let methods: HashSet<&str> = method_defs.iter().map(|def| def.name.as_str()).collect();
    let scope = Scope { fields: &fields, events: &events, methods: &methods, config };

    let mut functions = IndexVec::new();
    for def in &method_defs {
        functions.push(lower_function(&scope, def)?);
    }

    let constructor = lower_constructor(&scope, &field_decls, init_def)?;
    log::debug!(
        "analyzed contract `{}`: {} fields, {} functions, {} events",
        class.name,
        fields.len(),
        functions.len(),
        events.len()
    );
    Ok(ContractDefinition { name: class.name.clone(), fields, events, functions, constructor })
}

/// Resolves a type annotation such as `uint256` or `mapping[address, uint256]`.
pub fn resolve_type(annotation: &ast::Expr) -> Result<InterfaceType> {
    let location = annotation.location;
    match &annotation.kind {
        Syn::Name(name) => match name.as_str() {
            "uint256" | "uint" | "int" => Ok(InterfaceType::UInt256),
            "address" => Ok(InterfaceType::Address),
            "bool" => Ok(InterfaceType::Bool),
            "string" | "str" => Ok(InterfaceType::String),
            "bytes" => Ok(InterfaceType::Bytes),
            "mapping" | "dict" | "Mapping" | "Dict" | "array" | "Array" => Err(
                AnalysisError::semantic(format!("`{name}` needs type parameters"), location),
            ),
            _ => Err(AnalysisError::semantic(format!("unknown type `{name}`"), location)),
        },
        Syn::Subscript { value, index } => {
            let Syn::Name(generic) = &value.kind else {
                return Err(AnalysisError::semantic("invalid type annotation", location));
            };
            let params: Vec<&ast::Expr> = match &index.kind {
                Syn::Tuple(items) => items.iter().collect(),
                _ => vec![index.as_ref()],
            };
            match generic.as_str() {
                "mapping" | "dict" | "Mapping" | "Dict" => {
                    let [key, value] = params[..] else {
                        return Err(AnalysisError::semantic(
                            "mappings take a key and a value type",
                            location,
                        ));
                    };
                    let key_ty = resolve_type(key)?;
                    if !key_ty.is_static() {
                        return Err(AnalysisError::unsupported(
                            "non-static mapping key",
                            format!("mapping keys must be single-word types, not `{key_ty}`"),
                            key.location,
                        ));
                    }
                    let value_ty = resolve_type(value)?;
                    if !value_ty.is_static() && !matches!(value_ty, InterfaceType::Mapping(..)) {
                        return Err(AnalysisError::unsupported(
                            "dynamic mapping value",
                            format!("mapping values must be single-word types or mappings, not `{value_ty}`"),
                            value.location,
                        ));
                    }
                    Ok(InterfaceType::mapping(key_ty, value_ty))
                }
                "array" | "Array" => {
                    let [element, len] = params[..] else {
                        return Err(AnalysisError::semantic(
                            "arrays take an element type and a length",
                            location,
                        ));
                    };
                    let element_ty = resolve_type(element)?;
                    if !element_ty.is_static() {
                        return Err(AnalysisError::unsupported(
                            "dynamic array element",
                            format!("array elements must be single-word types, not `{element_ty}`"),
                            element.location,
                        ));
                    }
                    let Syn::Int(len_value) = &len.kind else {
                        return Err(AnalysisError::semantic(
                            "array length must be an integer literal",
                            len.location,
                        ));
                    };
                    match u32::try_from(*len_value) {
                        Ok(len) if len > 0 => Ok(InterfaceType::fixed_array(element_ty, len)),
                        _ => Err(AnalysisError::semantic(
                            format!("array length {len_value} is out of range"),
                            len.location,
                        )),
                    }
                }
                _ => Err(AnalysisError::semantic(format!("unknown type `{generic}`"), location)),
            }
        }
        _ => Err(AnalysisError::semantic("invalid type annotation", location)),
    }
}

fn check_storage_type(name: &str, ty: &InterfaceType, location: SourceLocation) -> Result<()> {
    if ty.is_dynamic() {
        return Err(AnalysisError::unsupported(
            "dynamic storage field",
            format!("field `{name}` has type `{ty}`; storage fields must be fixed size"),
            location,
        ));
    }
    Ok(())
}

fn resolve_value_type(annotation: &ast::Expr, what: &str) -> Result<InterfaceType> {
    let ty = resolve_type(annotation)?;
    if !ty.is_value() {
        return Err(AnalysisError::unsupported(
            "storage-only type",
            format!("{what} cannot have type `{ty}`"),
            annotation.location,
        ));
    }
    Ok(ty)
}

fn lower_event(def: &FunctionDef) -> Result<EventDeclaration> {
    if def.decorators.len() > 1 {
        return Err(AnalysisError::semantic(
            format!("event `{}` cannot carry other decorators", def.name),
            def.location,
        ));
    }
    let has_body = def.body.iter().any(|stmt| match &stmt.kind {
        StmtKind::Pass => false,
        StmtKind::Expr(expr) => !matches!(expr.kind, Syn::Ellipsis | Syn::Str(_)),
        _ => true,
    });
    if has_body {
        return Err(AnalysisError::semantic(
            format!("event `{}` cannot have a body", def.name),
            def.location,
        ));
    }
    let params = def.params.iter().skip_while(|param| param.name == "self");
    let mut fields: Vec<Param> = Vec::new();
    for param in params {
        let Some(annotation) = &param.annotation else {
            return Err(AnalysisError::semantic(
                format!("event field `{}` needs a type annotation", param.name),
                param.location,
            ));
        };
        if fields.iter().any(|field| field.name == param.name) {
            return Err(AnalysisError::semantic(
                format!("event field `{}` is declared twice", param.name),
                param.location,
            ));
        }
        let ty = resolve_value_type(annotation, "event fields")?;
        fields.push(Param { name: param.name.clone(), ty });
    }
    Ok(EventDeclaration { name: def.name.clone(), fields, location: def.location })
}

fn mutability_of(def: &FunctionDef) -> Result<Mutability> {
    let mut mutability = None;
    for decorator in &def.decorators {
        let tag = match decorator.name.as_str() {
            "view" | "view_function" | "pure" => Mutability::View,
            "public" | "public_function" | "external" => Mutability::Mutating,
            "payable" | "payable_function" => Mutability::Payable,
            other => {
                return Err(AnalysisError::unsupported(
                    format!("decorator @{other}"),
                    "known decorators are @view, @public, @payable and @event",
                    decorator.location,
                ));
            }
        };
        mutability = match (mutability, tag) {
            (None, tag) => Some(tag),
            (Some(Mutability::Mutating), tag) | (Some(tag), Mutability::Mutating) => Some(tag),
            (Some(current), tag) if current == tag => Some(tag),
            _ => {
                return Err(AnalysisError::semantic(
                    format!("function `{}` cannot be both view and payable", def.name),
                    decorator.location,
                ));
            }
        };
    }
    Ok(mutability.unwrap_or(Mutability::Mutating))
}

fn lower_function(scope: &Scope<'_>, def: &FunctionDef) -> Result<Function> {
    let mutability = mutability_of(def)?;
    let Some(first) = def.params.first().filter(|param| param.name == "self") else {
        return Err(AnalysisError::semantic(
            format!("first parameter of method `{}` must be `self`", def.name),
            def.location,
        ));
    };
    if first.annotation.is_some() {
        return Err(AnalysisError::semantic("`self` cannot be annotated", first.location));
    }

    let returns = match &def.returns {
        None => None,
        Some(annotation) if matches!(annotation.kind, Syn::None) => None,
        Some(annotation) => Some(resolve_value_type(annotation, "return values")?),
    };

    let mut body = Body::new(scope, &def.name, mutability, returns.clone(), false);
    let mut params = Vec::new();
    for param in &def.params[1..] {
        let Some(annotation) = &param.annotation else {
            return Err(AnalysisError::semantic(
                format!("parameter `{}` needs a type annotation", param.name),
                param.location,
            ));
        };
        let ty = resolve_value_type(annotation, "parameters")?;
        if body.names.contains_key(param.name.as_str()) || param.name == "self" {
            return Err(AnalysisError::semantic(
                format!("parameter `{}` is declared twice", param.name),
                param.location,
            ));
        }
        body.declare(&param.name, ty.clone());
        params.push(Param { name: param.name.clone(), ty });
    }

    let statements = body.block(&def.body)?;
    let signature = FunctionSignature { name: def.name.clone(), params, returns, mutability };
    Ok(Function { signature, locals: body.locals, body: statements, location: def.location })
}

fn lower_constructor(
    scope: &Scope<'_>,
    field_decls: &[&ast::FieldDecl],
    init_def: Option<&FunctionDef>,
) -> Result<Option<Constructor>> {
    let has_initializers = field_decls.iter().any(|decl| decl.value.is_some());
    if init_def.is_none() && !has_initializers {
        return Ok(None);
    }

    let mut payable = false;
    let mut location = SourceLocation::default();
    if let Some(def) = init_def {
        location = def.location;
        payable = match mutability_of(def)? {
            Mutability::Payable => true,
            Mutability::Mutating => false,
            Mutability::View => {
                return Err(AnalysisError::semantic("the constructor cannot be a view", location));
            }
        };
        if def.params.len() > 1 {
            return Err(AnalysisError::unsupported(
                "constructor parameters",
                "initial values come from field initializers or the constructor body",
                def.params[1].location,
            ));
        }
        if def.params.first().is_none_or(|param| param.name != "self") {
            return Err(AnalysisError::semantic(
                "first parameter of `__init__` must be `self`",
                location,
            ));
        }
        if def.returns.as_ref().is_some_and(|returns| !matches!(returns.kind, Syn::None)) {
            return Err(AnalysisError::semantic("the constructor cannot return a value", location));
        }
    }

    let mutability = if payable { Mutability::Payable } else { Mutability::Mutating };
    let mut body = Body::new(scope, INIT, mutability, None, true);
    let mut statements = Vec::new();
    for (field, decl) in field_decls.iter().enumerate() {
        let Some(value) = &decl.value else { continue };
        let field = FieldId::new(field as u32);
        let field_ty = &scope.fields[field].ty;
        if !field_ty.is_static() {
            return Err(AnalysisError::semantic(
                format!("field `{}` of type `{field_ty}` cannot have an initializer", decl.name),
                value.location,
            ));
        }
        let value = body.expr(value)?;
        expect_type(field_ty, &value.ty, decl.location)?;
        statements.push(Stmt::StateWrite { field, value });
    }
    if let Some(def) = init_def {
        statements.extend(body.block(&def.body)?);
    }
    Ok(Some(Constructor { payable, locals: body.locals, body: statements, location }))
}

fn expect_type(expected: &InterfaceType, found: &InterfaceType, location: SourceLocation) -> Result<()> {
    if expected != found {
        return Err(AnalysisError::semantic(
            format!("type mismatch: expected `{expected}`, found `{found}`"),
            location,
        ));
    }
    Ok(())
}

fn zero_value(ty: &InterfaceType) -> Expr {
    if ty.is_dynamic() {
        Expr::new(ExprKind::Text(Vec::new()), ty.clone())
    } else {
        Expr::literal(U256::ZERO, ty.clone())
    }
}

fn arity(name: &str, args: &[ast::Expr], range: std::ops::RangeInclusive<usize>, location: SourceLocation) -> Result<()> {
    if !range.contains(&args.len()) {
        let expected = if range.start() == range.end() {
            format!("{}", range.start())
        } else {
            format!("{} to {}", range.start(), range.end())
        };
        return Err(AnalysisError::semantic(
            format!("`{name}` takes {expected} arguments, got {}", args.len()),
            location,
        ));
    }
    Ok(())
}

/// Contract-wide declarations visible from every body.
struct Scope<'a> {
    fields: &'a IndexVec<FieldId, StateField>,
    events: &'a IndexVec<EventId, EventDeclaration>,
    methods: &'a HashSet<&'a str>,
    config: &'a AnalyzerConfig,
}

/// Storage location reached from `self`.
enum Access {
    Field { field: FieldId, ty: InterfaceType },
    /// `ty` is the type after applying every key, possibly still a mapping.
    Mapping { field: FieldId, keys: Vec<Expr>, ty: InterfaceType },
    Array { field: FieldId, index: Expr, ty: InterfaceType },
}

/// Per-function lowering state.
struct Body<'a> {
    scope: &'a Scope<'a>,
    name: &'a str,
    mutability: Mutability,
    returns: Option<InterfaceType>,
    constructor: bool,
    locals: IndexVec<LocalId, Local>,
    names: HashMap<String, LocalId>,
    loop_depth: usize,
    loops: usize,
    /// Counters of the enclosing `for` loops, innermost last.
    counters: Vec<LocalId>,
}

impl<'a> Body<'a> {
    fn new(
        scope: &'a Scope<'a>,
        name: &'a str,
        mutability: Mutability,
        returns: Option<InterfaceType>,
        constructor: bool,
    ) -> Self {
        Self {
            scope,
            name,
            mutability,
            returns,
            constructor,
            locals: IndexVec::new(),
            names: HashMap::new(),
            loop_depth: 0,
            loops: 0,
            counters: Vec::new(),
        }
    }

    fn ensure_not_counter(&self, local: LocalId, location: SourceLocation) -> Result<()> {
        if self.counters.contains(&local) {
            return Err(AnalysisError::unsupported(
                "loop counter assignment",
                format!(
                    "`{}` is the counter of an enclosing loop and cannot be reassigned",
                    self.locals[local].name
                ),
                location,
            ));
        }
        Ok(())
    }

    fn declare(&mut self, name: &str, ty: InterfaceType) -> LocalId {
        let local = self.locals.push(Local { name: name.to_string(), ty });
        self.names.insert(name.to_string(), local);
        local
    }

    fn field(&self, name: &str, location: SourceLocation) -> Result<FieldId> {
        if let Some(field) = self.scope.fields.position(|field| field.name == name) {
            return Ok(field);
        }
        if self.scope.methods.contains(name) {
            return Err(AnalysisError::semantic(
                format!("method `{name}` cannot be used as a value"),
                location,
            ));
        }
        Err(AnalysisError::semantic(format!("undeclared field `self.{name}`"), location))
    }

    fn ensure_mutable(&self, location: SourceLocation, what: &str) -> Result<()> {
        if self.mutability == Mutability::View {
            return Err(AnalysisError::semantic(
                format!("view function `{}` cannot {what}", self.name),
                location,
            ));
        }
        Ok(())
    }

    fn block(&mut self, stmts: &[ast::Stmt]) -> Result<Vec<Stmt>> {
        let mut lowered = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            if let Some(stmt) = self.stmt(stmt)? {
                lowered.push(stmt);
            }
        }
        Ok(lowered)
    }

    fn stmt(&mut self, stmt: &ast::Stmt) -> Result<Option<Stmt>> {
        let location = stmt.location;
        let lowered = match &stmt.kind {
            StmtKind::Pass => return Ok(None),
            StmtKind::Expr(expr) => return self.expr_stmt(expr),
            StmtKind::Assign { target, value } => {
                let value = self.expr(value)?;
                self.assign(target, value, location)?
            }
            StmtKind::AnnAssign { target, annotation, value } => {
                let ty = resolve_value_type(annotation, "variables")?;
                let value = match value {
                    Some(value) => self.expr(value)?,
                    None => zero_value(&ty),
                };
                expect_type(&ty, &value.ty, location)?;
                if let Syn::Name(name) = &target.kind
                    && !self.names.contains_key(name)
                {
                    self.declare(name, ty);
                }
                self.assign(target, value, location)?
            }
            StmtKind::AugAssign { target, op, value } => {
                let current = self.expr(target)?;
                let value = self.expr(value)?;
                let updated = self.binary(*op, current, value, location)?;
                self.assign(target, updated, location)?
            }
            StmtKind::If { condition, body, orelse } => Stmt::If {
                condition: self.condition(condition)?,
                then_body: self.block(body)?,
                else_body: self.block(orelse)?,
            },
            StmtKind::For { target, iter, body } => self.for_loop(target, iter, body, location)?,
            StmtKind::Break | StmtKind::Continue if self.loop_depth == 0 => {
                return Err(AnalysisError::semantic("`break`/`continue` outside of a loop", location));
            }
            StmtKind::Break => Stmt::Break,
            StmtKind::Continue => Stmt::Continue,
            StmtKind::Return(value) => self.return_stmt(value.as_ref(), location)?,
            StmtKind::Assert { test, message } => Stmt::Abort {
                condition: Some(self.condition(test)?),
                reason: message.as_ref().map(reason_literal).transpose()?,
            },
            StmtKind::Unsupported(unsupported) => return Err(unsupported.error(location)),
        };
        Ok(Some(lowered))
    }

    fn expr_stmt(&mut self, expr: &ast::Expr) -> Result<Option<Stmt>> {
        let location = expr.location;
        let Syn::Call { func, args } = &expr.kind else {
            if matches!(expr.kind, Syn::Str(_) | Syn::Ellipsis) {
                return Ok(None);
            }
            self.expr(expr)?;
            return Err(AnalysisError::semantic("statement has no effect", location));
        };

        match &func.kind {
            Syn::Name(name) if name == "require" => {
                arity("require", args, 1..=2, location)?;
                Ok(Some(Stmt::Abort {
                    condition: Some(self.condition(&args[0])?),
                    reason: args.get(1).map(reason_literal).transpose()?,
                }))
            }
            Syn::Name(name) if name == "revert" => {
                arity("revert", args, 0..=1, location)?;
                Ok(Some(Stmt::Abort {
                    condition: None,
                    reason: args.first().map(reason_literal).transpose()?,
                }))
            }
            Syn::Attribute { value, attr } if value.is_name("self") && (attr == "event" || attr == "emit") => {
                self.emit(args, location).map(Some)
            }
            Syn::Attribute { value, attr }
                if attr == INIT
                    && matches!(&value.kind, Syn::Call { func, .. } if func.is_name("super")) =>
            {
                Ok(None)
            }
            _ => {
                self.expr(expr)?;
                Err(AnalysisError::semantic("statement has no effect", location))
            }
        }
    }

    fn emit(&mut self, args: &[ast::Expr], location: SourceLocation) -> Result<Stmt> {
        let Some(Syn::Str(name)) = args.first().map(|arg| &arg.kind) else {
            return Err(AnalysisError::semantic(
                "`self.event` takes the event name as a string literal first",
                location,
            ));
        };
        let name = String::from_utf8_lossy(name);
        let Some(event) = self.scope.events.position(|event| event.name == name) else {
            return Err(AnalysisError::semantic(format!("unknown event `{name}`"), location));
        };
        self.ensure_mutable(location, "emit events")?;
        let declaration = &self.scope.events[event];
        let values = &args[1..];
        if values.len() != declaration.fields.len() {
            return Err(AnalysisError::semantic(
                format!(
                    "event `{name}` has {} fields, got {} arguments",
                    declaration.fields.len(),
                    values.len()
                ),
                location,
            ));
        }
        let mut lowered = Vec::with_capacity(values.len());
        for (value, field) in values.iter().zip(&declaration.fields) {
            let value_location = value.location;
            let value = self.expr(value)?;
            expect_type(&field.ty, &value.ty, value_location)?;
            lowered.push(value);
        }
        Ok(Stmt::Emit { event, args: lowered })
    }

    fn assign(&mut self, target: &ast::Expr, value: Expr, location: SourceLocation) -> Result<Stmt> {
        match &target.kind {
            Syn::Name(name) if name == "self" => {
                Err(AnalysisError::semantic("cannot assign to `self`", location))
            }
            Syn::Name(name) => {
                let local = match self.names.get(name) {
                    Some(local) => {
                        self.ensure_not_counter(*local, location)?;
                        expect_type(&self.locals[*local].ty, &value.ty, location)?;
                        *local
                    }
                    None => self.declare(name, value.ty.clone()),
                };
                Ok(Stmt::LocalWrite { local, value })
            }
            Syn::Attribute { value: base, attr } if base.is_name("self") => {
                if !self.scope.fields.iter().any(|field| &field.name == attr) {
                    if self.scope.methods.contains(attr.as_str()) {
                        return Err(AnalysisError::semantic(
                            format!("cannot assign to method `{attr}`"),
                            location,
                        ));
                    }
                    return Err(AnalysisError::unsupported(
                        "dynamic attribute creation",
                        format!("`self.{attr}` is not a declared field; declare it in the class body"),
                        target.location,
                    ));
                }
                self.store(target, value, location)
            }
            Syn::Subscript { .. } => self.store(target, value, location),
            _ => Err(AnalysisError::unsupported(
                "assignment target",
                "only locals and `self` storage can be assigned",
                target.location,
            )),
        }
    }

    fn store(&mut self, target: &ast::Expr, value: Expr, location: SourceLocation) -> Result<Stmt> {
        let Some(access) = self.storage_access(target)? else {
            return Err(AnalysisError::semantic(
                "only storage mappings and arrays can be indexed",
                target.location,
            ));
        };
        self.ensure_mutable(location, "modify state")?;
        match access {
            Access::Field { field, ty } => {
                if !ty.is_value() {
                    return Err(AnalysisError::semantic(
                        format!("`self.{}` of type `{ty}` cannot be assigned as a whole", self.scope.fields[field].name),
                        location,
                    ));
                }
                expect_type(&ty, &value.ty, location)?;
                Ok(Stmt::StateWrite { field, value })
            }
            Access::Mapping { field, keys, ty } => {
                if !ty.is_value() {
                    return Err(AnalysisError::semantic(
                        format!("mapping `self.{}` needs more keys", self.scope.fields[field].name),
                        location,
                    ));
                }
                expect_type(&ty, &value.ty, location)?;
                Ok(Stmt::MappingWrite { field, keys, value })
            }
            Access::Array { field, index, ty } => {
                expect_type(&ty, &value.ty, location)?;
                Ok(Stmt::ArrayWrite { field, index, value })
            }
        }
    }

    fn for_loop(
        &mut self,
        target: &str,
        iter: &ast::Expr,
        body: &[ast::Stmt],
        location: SourceLocation,
    ) -> Result<Stmt> {
        self.loops += 1;
        if self.loops > self.scope.config.max_loops_per_function {
            return Err(AnalysisError::unsupported(
                "loop limit",
                format!(
                    "`{}` has more than {} loops",
                    self.name, self.scope.config.max_loops_per_function
                ),
                location,
            ));
        }
        let Syn::Call { func, args } = &iter.kind else {
            return Err(AnalysisError::unsupported(
                "iteration over collection",
                "only `range(...)` loops have a static bound",
                iter.location,
            ));
        };
        if !func.is_name("range") {
            return Err(AnalysisError::unsupported(
                "iteration over collection",
                "only `range(...)` loops have a static bound",
                iter.location,
            ));
        }
        if args.len() == 3 {
            return Err(AnalysisError::unsupported(
                "range step",
                "ranges always advance by one",
                args[2].location,
            ));
        }
        let (start, end) = match &args[..] {
            [end] => (Expr::uint(0), self.expr(end)?),
            [start, end] => (self.expr(start)?, self.expr(end)?),
            _ => {
                arity("range", args, 1..=2, iter.location)?;
                return Err(AnalysisError::semantic("invalid `range` call", iter.location));
            }
        };
        expect_type(&InterfaceType::UInt256, &start.ty, iter.location)?;
        expect_type(&InterfaceType::UInt256, &end.ty, iter.location)?;
        if let (ExprKind::Literal(first), ExprKind::Literal(last)) = (&start.kind, &end.kind) {
            let iterations = last.saturating_sub(*first);
            if iterations > U256::from(self.scope.config.max_range_iterations) {
                return Err(AnalysisError::unsupported(
                    "loop bound",
                    format!(
                        "range of {iterations} iterations exceeds the limit of {}",
                        self.scope.config.max_range_iterations
                    ),
                    iter.location,
                ));
            }
        }

        let counter = match self.names.get(target) {
            Some(local) => {
                self.ensure_not_counter(*local, location)?;
                expect_type(&InterfaceType::UInt256, &self.locals[*local].ty, location)?;
                *local
            }
            None => self.declare(target, InterfaceType::UInt256),
        };
        self.loop_depth += 1;
        self.counters.push(counter);
        let body = self.block(body);
        self.counters.pop();
        self.loop_depth -= 1;
        let body = body?;
        Ok(Stmt::For { counter, start, end, body })
    }

    fn return_stmt(&mut self, value: Option<&ast::Expr>, location: SourceLocation) -> Result<Stmt> {
        let value = value.filter(|value| !matches!(value.kind, Syn::None));
        match (value, self.returns.clone()) {
            (None, None) => Ok(Stmt::Return(None)),
            (Some(_), None) if self.constructor => {
                Err(AnalysisError::semantic("the constructor cannot return a value", location))
            }
            (Some(_), None) => Err(AnalysisError::semantic(
                format!("function `{}` does not declare a return type", self.name),
                location,
            )),
            (None, Some(ty)) => Err(AnalysisError::semantic(
                format!("function `{}` must return a `{ty}`", self.name),
                location,
            )),
            (Some(value), Some(ty)) => {
                let value = self.expr(value)?;
                expect_type(&ty, &value.ty, location)?;
                Ok(Stmt::Return(Some(value)))
            }
        }
    }

    /// Lowers a truth test. Integers and addresses are true when non-zero, as in Python.
    fn condition(&mut self, expr: &ast::Expr) -> Result<Expr> {
        let location = expr.location;
        let value = self.expr(expr)?;
        match value.ty {
            InterfaceType::Bool => Ok(value),
            InterfaceType::UInt256 | InterfaceType::Address => {
                let zero = Expr::literal(U256::ZERO, value.ty.clone());
                Ok(Expr::binary(BinaryOp::Ne, value, zero, InterfaceType::Bool))
            }
            ref ty => Err(AnalysisError::semantic(
                format!("`{ty}` cannot be used as a condition"),
                location,
            )),
        }
    }

    fn expr(&mut self, expr: &ast::Expr) -> Result<Expr> {
        let location = expr.location;
        match &expr.kind {
            Syn::Int(value) => Ok(Expr::literal(*value, InterfaceType::UInt256)),
            Syn::Bool(value) => Ok(Expr::bool(*value)),
            Syn::Str(bytes) => Ok(Expr::new(ExprKind::Text(bytes.clone()), InterfaceType::String)),
            Syn::Bytes(bytes) => Ok(Expr::new(ExprKind::Text(bytes.clone()), InterfaceType::Bytes)),
            Syn::None => Err(AnalysisError::semantic("`None` is not a value", location)),
            Syn::Ellipsis => Err(AnalysisError::semantic("`...` is not a value", location)),
            Syn::Name(name) => self.name(name, location),
            Syn::Attribute { value, attr } => self.attribute(value, attr, location),
            Syn::Subscript { .. } => {
                let Some(access) = self.storage_access(expr)? else {
                    return Err(AnalysisError::semantic(
                        "only storage mappings and arrays can be indexed",
                        location,
                    ));
                };
                self.read(access, location)
            }
            Syn::Tuple(_) => Err(AnalysisError::unsupported("tuple", "tuples are not supported", location)),
            Syn::Unsupported(unsupported) => Err(unsupported.error(location)),
            Syn::Call { func, args } => self.call(func, args, location),
            Syn::Binary { op: op @ (BinaryOp::And | BinaryOp::Or), lhs, rhs } => {
                let lhs = self.condition(lhs)?;
                let rhs = self.condition(rhs)?;
                Ok(Expr::binary(*op, lhs, rhs, InterfaceType::Bool))
            }
            Syn::Binary { op, lhs, rhs } => {
                let lhs = self.expr(lhs)?;
                let rhs = self.expr(rhs)?;
                self.binary(*op, lhs, rhs, location)
            }
            Syn::Unary { op, operand } => match op {
                UnaryOperator::Not => {
                    let operand = self.condition(operand)?;
                    Ok(Expr::new(
                        ExprKind::Unary { op: UnaryOp::Not, operand: Box::new(operand) },
                        InterfaceType::Bool,
                    ))
                }
                UnaryOperator::Pos | UnaryOperator::Neg | UnaryOperator::Invert => {
                    let operand = self.expr(operand)?;
                    expect_type(&InterfaceType::UInt256, &operand.ty, location)?;
                    Ok(match op {
                        UnaryOperator::Neg => {
                            Expr::binary(BinaryOp::Sub, Expr::uint(0), operand, InterfaceType::UInt256)
                        }
                        UnaryOperator::Invert => Expr::new(
                            ExprKind::Unary { op: UnaryOp::BitNot, operand: Box::new(operand) },
                            InterfaceType::UInt256,
                        ),
                        _ => operand,
                    })
                }
            },
        }
    }

    fn name(&self, name: &str, location: SourceLocation) -> Result<Expr> {
        if let Some(local) = self.names.get(name) {
            return Ok(Expr::new(ExprKind::LocalRead(*local), self.locals[*local].ty.clone()));
        }
        let message = if name == "self" {
            "`self` cannot be used as a value".to_string()
        } else if self.scope.fields.iter().any(|field| field.name == name) {
            format!("undeclared variable `{name}` (did you mean `self.{name}`?)")
        } else {
            format!("undeclared variable `{name}`")
        };
        Err(AnalysisError::semantic(message, location))
    }

    fn attribute(&mut self, base: &ast::Expr, attr: &str, location: SourceLocation) -> Result<Expr> {
        let Syn::Name(base_name) = &base.kind else {
            return Err(AnalysisError::unsupported(
                "attribute access",
                "only `self`, `msg` and `block` attributes are available",
                location,
            ));
        };
        match (base_name.as_str(), attr) {
            ("self", _) => {
                let field = self.field(attr, location)?;
                let ty = self.scope.fields[field].ty.clone();
                self.read(Access::Field { field, ty }, location)
            }
            ("msg", "sender") => Ok(Expr::new(ExprKind::CallerRead, InterfaceType::Address)),
            ("msg", "value") => {
                if self.mutability != Mutability::Payable {
                    return Err(AnalysisError::semantic(
                        format!(
                            "`msg.value` is only available in payable functions, `{}` is not payable",
                            self.name
                        ),
                        location,
                    ));
                }
                Ok(Expr::new(ExprKind::ValueRead, InterfaceType::UInt256))
            }
            ("block", "timestamp") => Ok(Expr::new(ExprKind::TimestampRead, InterfaceType::UInt256)),
            ("msg" | "block" | "tx", _) => Err(AnalysisError::unsupported(
                format!("environment attribute {base_name}.{attr}"),
                "available: `msg.sender`, `msg.value` and `block.timestamp`",
                location,
            )),
            _ if self.names.contains_key(base_name.as_str()) => Err(AnalysisError::semantic(
                format!("`{base_name}` has no attribute `{attr}`"),
                location,
            )),
            _ => Err(AnalysisError::semantic(format!("undeclared variable `{base_name}`"), location)),
        }
    }

    /// Resolves `self.f`, `self.m[k1][k2]` and `self.a[i]`. Returns `None` when the expression
    /// is not rooted at a `self` field.
    fn storage_access(&mut self, expr: &ast::Expr) -> Result<Option<Access>> {
        let mut indices = Vec::new();
        let mut base = expr;
        while let Syn::Subscript { value, index } = &base.kind {
            indices.push(index.as_ref());
            base = value;
        }
        indices.reverse();
        let Some(name) = base.self_attribute() else { return Ok(None) };
        let field = self.field(name, base.location)?;
        let ty = self.scope.fields[field].ty.clone();
        if indices.is_empty() {
            return Ok(Some(Access::Field { field, ty }));
        }

        match ty {
            InterfaceType::Mapping(..) => {
                let mut current = ty;
                let mut keys = Vec::with_capacity(indices.len());
                for index in indices {
                    let InterfaceType::Mapping(key_ty, value_ty) = current else {
                        return Err(AnalysisError::semantic(
                            format!("too many subscripts on `self.{name}`"),
                            index.location,
                        ));
                    };
                    let key = self.expr(index)?;
                    expect_type(&key_ty, &key.ty, index.location)?;
                    keys.push(key);
                    current = *value_ty;
                }
                Ok(Some(Access::Mapping { field, keys, ty: current }))
            }
            InterfaceType::FixedArray(element, _) => {
                let [index] = indices[..] else {
                    return Err(AnalysisError::semantic(
                        format!("`self.{name}` takes exactly one index"),
                        expr.location,
                    ));
                };
                let index_location = index.location;
                let index = self.expr(index)?;
                expect_type(&InterfaceType::UInt256, &index.ty, index_location)?;
                Ok(Some(Access::Array { field, index, ty: *element }))
            }
            ty => Err(AnalysisError::semantic(
                format!("`self.{name}` of type `{ty}` cannot be indexed"),
                expr.location,
            )),
        }
    }

    fn read(&self, access: Access, location: SourceLocation) -> Result<Expr> {
        let (kind, ty, field) = match access {
            Access::Field { field, ty } => (ExprKind::StateRead(field), ty, field),
            Access::Mapping { field, keys, ty } => (ExprKind::MappingRead { field, keys }, ty, field),
            Access::Array { field, index, ty } => {
                (ExprKind::ArrayRead { field, index: Box::new(index) }, ty, field)
            }
        };
        if !ty.is_value() {
            return Err(AnalysisError::semantic(
                format!(
                    "`self.{}` is a `{ty}` and cannot be used as a value",
                    self.scope.fields[field].name
                ),
                location,
            ));
        }
        Ok(Expr::new(kind, ty))
    }

    fn call(&mut self, func: &ast::Expr, args: &[ast::Expr], location: SourceLocation) -> Result<Expr> {
        match &func.kind {
            Syn::Name(name) => self.builtin(name, args, location),
            Syn::Attribute { value, attr }
                if attr == "get"
                    && (value.self_attribute().is_some()
                        || matches!(value.kind, Syn::Subscript { .. })) =>
            {
                self.mapping_get(value, args, location)
            }
            Syn::Attribute { value, attr } if value.is_name("self") => {
                if attr == "event" || attr == "emit" {
                    Err(AnalysisError::semantic("event emission is a statement, not a value", location))
                } else if attr == self.name {
                    Err(AnalysisError::unsupported(
                        "unbounded recursion",
                        format!("`{attr}` calls itself"),
                        location,
                    ))
                } else if self.scope.methods.contains(attr.as_str()) {
                    Err(AnalysisError::unsupported(
                        "internal call",
                        format!("calling `self.{attr}` from another method is not supported"),
                        location,
                    ))
                } else if self.scope.fields.iter().any(|field| &field.name == attr) {
                    Err(AnalysisError::semantic(format!("`self.{attr}` is not callable"), location))
                } else {
                    Err(AnalysisError::unsupported(
                        "dynamic attribute creation",
                        format!("`self.{attr}` is not a method or field of this contract"),
                        location,
                    ))
                }
            }
            _ => Err(AnalysisError::unsupported(
                "external call",
                "calls into other contracts or objects are not supported",
                location,
            )),
        }
    }

    fn builtin(&mut self, name: &str, args: &[ast::Expr], location: SourceLocation) -> Result<Expr> {
        match name {
            "address" | "uint256" | "int" | "uint" => {
                arity(name, args, 1..=1, location)?;
                let mut value = self.expr(&args[0])?;
                if !value.ty.is_static() {
                    return Err(AnalysisError::semantic(
                        format!("cannot convert `{}` with `{name}`", value.ty),
                        location,
                    ));
                }
                value.ty =
                    if name == "address" { InterfaceType::Address } else { InterfaceType::UInt256 };
                Ok(value)
            }
            "bool" => {
                arity(name, args, 1..=1, location)?;
                self.condition(&args[0])
            }
            "len" => {
                arity(name, args, 1..=1, location)?;
                if let Some(field) = args[0].self_attribute() {
                    let field = self.field(field, args[0].location)?;
                    if let InterfaceType::FixedArray(_, len) = &self.scope.fields[field].ty {
                        return Ok(Expr::uint(u64::from(*len)));
                    }
                }
                let value = self.expr(&args[0])?;
                if !value.ty.is_dynamic() {
                    return Err(AnalysisError::semantic(
                        format!("`len` needs a string, bytes or array, found `{}`", value.ty),
                        location,
                    ));
                }
                Ok(Expr::new(ExprKind::Length(Box::new(value)), InterfaceType::UInt256))
            }
            "require" | "revert" => Err(AnalysisError::semantic(
                format!("`{name}` is a statement, not a value"),
                location,
            )),
            "range" => Err(AnalysisError::semantic(
                "`range` is only allowed in `for` loops",
                location,
            )),
            _ if self.scope.methods.contains(name) => Err(AnalysisError::unsupported(
                "internal call",
                format!("`{name}` is a method, and calls between methods are not supported"),
                location,
            )),
            _ => Err(AnalysisError::unsupported(
                "external call",
                format!("call to unknown function `{name}`"),
                location,
            )),
        }
    }

    /// `self.m.get(key, 0)`: a plain mapping read, since absent entries already read as zero.
    fn mapping_get(&mut self, mapping: &ast::Expr, args: &[ast::Expr], location: SourceLocation) -> Result<Expr> {
        arity("get", args, 1..=2, location)?;
        if let Some(default) = args.get(1) {
            let is_zero = match &default.kind {
                Syn::Int(value) => value.is_zero(),
                Syn::Bool(value) => !value,
                _ => false,
            };
            if !is_zero {
                return Err(AnalysisError::unsupported(
                    "non-zero mapping default",
                    "missing mapping entries always read as zero",
                    default.location,
                ));
            }
        }
        let Some(Access::Mapping { field, mut keys, ty }) = self.mapping_prefix(mapping)? else {
            return Err(AnalysisError::semantic("`.get` is only available on mappings", location));
        };
        let InterfaceType::Mapping(key_ty, value_ty) = ty else {
            return Err(AnalysisError::semantic("`.get` is only available on mappings", location));
        };
        let key = self.expr(&args[0])?;
        expect_type(&key_ty, &key.ty, args[0].location)?;
        keys.push(key);
        self.read(Access::Mapping { field, keys, ty: *value_ty }, location)
    }

    fn mapping_prefix(&mut self, expr: &ast::Expr) -> Result<Option<Access>> {
        Ok(match self.storage_access(expr)? {
            Some(Access::Field { field, ty }) => Some(Access::Mapping { field, keys: Vec::new(), ty }),
            other => other,
        })
    }

    fn binary(&self, op: BinaryOp, lhs: Expr, rhs: Expr, location: SourceLocation) -> Result<Expr> {
        use InterfaceType::*;
        if lhs.ty.is_dynamic() || rhs.ty.is_dynamic() {
            let construct = match op {
                BinaryOp::Add => "string concatenation",
                op if op.is_comparison() => "comparison of dynamic values",
                _ => "operator on dynamic values",
            };
            return Err(AnalysisError::unsupported(
                construct,
                format!("`{}` cannot be applied to `{}` and `{}`", op.symbol(), lhs.ty, rhs.ty),
                location,
            ));
        }
        let ty = match op {
            BinaryOp::And | BinaryOp::Or => {
                expect_type(&Bool, &lhs.ty, location)?;
                expect_type(&Bool, &rhs.ty, location)?;
                Bool
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                expect_type(&lhs.ty, &rhs.ty, location)?;
                Bool
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                expect_type(&UInt256, &lhs.ty, location)?;
                expect_type(&UInt256, &rhs.ty, location)?;
                Bool
            }
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor if lhs.ty == Bool => {
                expect_type(&Bool, &rhs.ty, location)?;
                Bool
            }
            _ => {
                expect_type(&UInt256, &lhs.ty, location)?;
                expect_type(&UInt256, &rhs.ty, location)?;
                UInt256
            }
        };
        Ok(Expr::binary(op, lhs, rhs, ty))
    }
}

fn reason_literal(expr: &ast::Expr) -> Result<String> {
    match &expr.kind {
        Syn::Str(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
        _ => Err(AnalysisError::unsupported(
            "dynamic revert reason",
            "revert reasons must be string literals",
            expr.location,
        )),
    }
}
