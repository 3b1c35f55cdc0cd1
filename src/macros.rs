use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    rc::Rc,
};

use thiserror::Error;
use tracing::debug;

use crate::{
    config::Config,
    engine::{Trace, evaluate},
    expr::Expr,
    strategy::Strategy,
};

/// Errors raised when defining or referencing a macro.
///
/// A failed definition leaves the table exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MacroError {
    /// A reference to a macro that has not been defined.
    #[error("Unbound macro: {name}")]
    Unbound { name: String },
    /// The macro body has a free variable.
    #[error("Macro {name} is not closed: free variable '{variable}'")]
    NotClosed { name: String, variable: String },
    /// The definition would make macros depend on each other in a cycle.
    /// `cycle` starts and ends with the same macro.
    #[error("Defining {name} would create a dependency cycle: {}", .cycle.join(" -> "))]
    Cyclic { name: String, cycle: Vec<String> },
    /// The name is not an uppercase macro name.
    #[error("Invalid macro name '{name}'")]
    InvalidName { name: String },
}

/// Checks whether `name` can name a macro: an ASCII uppercase letter followed
/// by uppercase letters, digits or `_`.
///
/// # Examples
/// ```
/// use lambstep::macros::is_macro_name;
/// assert!(is_macro_name("TRUE"));
/// assert!(is_macro_name("Y2_K"));
/// assert!(!is_macro_name("True"));
/// assert!(!is_macro_name("x"));
/// ```
#[must_use]
pub fn is_macro_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// A named closed term together with the values pre-computed for it.
///
/// When normal-order reduction of the body converges only `normal_form` is
/// set, since a normal form serves every strategy. Otherwise call-by-name and
/// call-by-value are tried independently and whichever converged is kept.
/// A macro with no value at all still works; it just never reduces past its
/// literal body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDefinition {
    name: String,
    body: Expr,
    cbv_value: Option<Expr>,
    cbn_value: Option<Expr>,
    normal_form: Option<Expr>,
}

impl MacroDefinition {
    fn new(name: &str, body: Expr) -> Self {
        Self {
            name: name.to_string(),
            body,
            cbv_value: None,
            cbn_value: None,
            normal_form: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The body as it was defined, before any reduction.
    #[must_use]
    pub const fn body(&self) -> &Expr {
        &self.body
    }

    #[must_use]
    pub const fn cbv_value(&self) -> Option<&Expr> {
        self.cbv_value.as_ref()
    }

    #[must_use]
    pub const fn cbn_value(&self) -> Option<&Expr> {
        self.cbn_value.as_ref()
    }

    #[must_use]
    pub const fn normal_form(&self) -> Option<&Expr> {
        self.normal_form.as_ref()
    }

    /// The pre-computed value to use under `strategy`: the normal form if
    /// there is one, else the value found by that strategy.
    ///
    /// Applicative and normal order only ever use the normal form.
    #[must_use]
    pub const fn value_for(&self, strategy: Strategy) -> Option<&Expr> {
        if self.normal_form.is_some() {
            return self.normal_form.as_ref();
        }
        match strategy {
            Strategy::CallByValue => self.cbv_value.as_ref(),
            Strategy::CallByName => self.cbn_value.as_ref(),
            Strategy::Applicative | Strategy::Normal => None,
        }
    }

    /// Names of the macros referenced by the body.
    #[must_use]
    pub fn dependencies(&self) -> BTreeSet<String> {
        self.body.referenced_macros()
    }
}

#[derive(Clone, Copy)]
enum Mark {
    Visiting,
    Done,
}

/// The macros of one session, keyed by name.
///
/// Definitions go through [`MacroTable::define`], which validates the body,
/// rejects dependency cycles and recompiles whatever depends on the changed
/// macro. The dependency graph is acyclic at all times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroTable {
    definitions: BTreeMap<String, MacroDefinition>,
    budget: usize,
}

impl Default for MacroTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MacroTable {
    /// Creates an empty table with the default definition budget.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    #[must_use]
    pub const fn with_config(config: &Config) -> Self {
        Self {
            definitions: BTreeMap::new(),
            budget: config.definition_budget,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MacroDefinition> {
        self.definitions.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Removes every macro.
    pub fn clear(&mut self) {
        self.definitions.clear();
    }

    /// Defines or redefines `name` as `body`.
    ///
    /// The body must be closed and may only reference macros that already
    /// exist. After the new definition is in place, the macro and everything
    /// that depends on it are recompiled in dependency order. Nothing is
    /// changed unless every step succeeds.
    ///
    /// # Returns
    /// The normal-order trace of the body, which may have timed out.
    ///
    /// # Errors
    /// * `InvalidName` - `name` is not an uppercase macro name
    /// * `NotClosed` - the body has a free variable
    /// * `Unbound` - the body references an undefined macro
    /// * `Cyclic` - the definition would introduce a dependency cycle
    ///
    /// # Examples
    /// ```
    /// use lambstep::{abs, app, macros::MacroTable};
    ///
    /// let mut table = MacroTable::new();
    /// let trace = table.define("I", app!(abs!("x", "x"), abs!("y", "y"))).unwrap();
    /// assert_eq!(trace, ["(λx.x)(λy.y)", "λy.y"]);
    /// assert_eq!(table.get("I").unwrap().normal_form(), Some(&abs!("y", "y")));
    /// ```
    pub fn define(&mut self, name: &str, body: Expr) -> Result<Trace, MacroError> {
        if !is_macro_name(name) {
            return Err(MacroError::InvalidName {
                name: name.to_string(),
            });
        }
        if let Some(variable) = body.first_free_variable() {
            return Err(MacroError::NotClosed {
                name: name.to_string(),
                variable: variable.to_string(),
            });
        }
        if let Some(unbound) = body
            .referenced_macros()
            .into_iter()
            .find(|dependency| dependency != name && !self.contains(dependency))
        {
            return Err(MacroError::Unbound { name: unbound });
        }

        // Work on a copy; the table is only replaced once everything succeeded
        let mut candidate = self.clone();
        candidate
            .definitions
            .insert(name.to_string(), MacroDefinition::new(name, body));
        let order = candidate.dependency_order().map_err(|cycle| {
            debug!(macro_name = name, ?cycle, "rejected definition");
            MacroError::Cyclic {
                name: name.to_string(),
                cycle,
            }
        })?;

        let mut affected = BTreeSet::from([name.to_string()]);
        let mut trace = Trace::new();
        for current in &order {
            let Some(definition) = candidate.definitions.get(current) else {
                continue;
            };
            let is_target = current == name;
            if !is_target && definition.dependencies().is_disjoint(&affected) {
                continue;
            }
            let (compiled, compile_trace) = candidate.compile(definition);
            if is_target {
                trace = compile_trace;
            } else {
                debug!(macro_name = current.as_str(), "recompiled dependent");
            }
            affected.insert(current.clone());
            candidate.definitions.insert(current.clone(), compiled);
        }

        *self = candidate;
        Ok(trace)
    }

    /// Builds a reference to `name` resolved for `strategy`.
    ///
    /// # Errors
    /// Returns `Unbound` if no macro has that name.
    pub fn reference(&self, name: &str, strategy: Strategy) -> Result<Expr, MacroError> {
        self.resolve(name, strategy)
            .map(|resolved| Expr::macro_ref(name, resolved))
            .ok_or_else(|| MacroError::Unbound {
                name: name.to_string(),
            })
    }

    /// The body a reference to `name` stands for under `strategy`.
    ///
    /// Priority: normal form, then the strategy's own value, then the
    /// unreduced body with its references resolved afresh.
    #[must_use]
    pub fn resolve(&self, name: &str, strategy: Strategy) -> Option<Expr> {
        let definition = self.definitions.get(name)?;
        Some(definition.value_for(strategy).map_or_else(
            || self.refresh(&definition.body, strategy),
            Clone::clone,
        ))
    }

    /// Re-resolves every macro reference in `expr` against the current table.
    ///
    /// References to names that are not defined are left as they are.
    #[must_use]
    pub fn refresh(&self, expr: &Expr, strategy: Strategy) -> Expr {
        match expr {
            Expr::Var(_) => expr.clone(),
            Expr::Abs(name, body) => {
                Expr::Abs(name.clone(), Rc::new(self.refresh(body, strategy)))
            }
            Expr::App(func, arg) => Expr::App(
                Rc::new(self.refresh(func, strategy)),
                Rc::new(self.refresh(arg, strategy)),
            ),
            Expr::MacroRef(name, _) => self
                .reference(name, strategy)
                .unwrap_or_else(|_| expr.clone()),
        }
    }

    /// All definitions, dependencies before dependents and otherwise by name.
    #[must_use]
    pub fn list(&self) -> Vec<&MacroDefinition> {
        let order = self
            .dependency_order()
            .unwrap_or_else(|_| self.definitions.keys().cloned().collect());
        order
            .iter()
            .filter_map(|name| self.definitions.get(name))
            .collect()
    }

    /// Pre-evaluates one definition against the rest of the table.
    fn compile(&self, definition: &MacroDefinition) -> (MacroDefinition, Trace) {
        let name = definition.name();
        let body = definition.body();
        let mut compiled = MacroDefinition::new(name, body.clone());

        let normal = evaluate(
            &self.refresh(body, Strategy::Normal),
            Strategy::Normal,
            self.budget,
        );
        if let Some(normal_form) = normal.value {
            debug!(macro_name = name, steps = normal.steps, "found normal form");
            compiled.normal_form = Some(normal_form);
        } else {
            let by_name = evaluate(
                &self.refresh(body, Strategy::CallByName),
                Strategy::CallByName,
                self.budget,
            );
            let by_value = evaluate(
                &self.refresh(body, Strategy::CallByValue),
                Strategy::CallByValue,
                self.budget,
            );
            compiled.cbn_value = by_name.value;
            compiled.cbv_value = by_value.value;
            debug!(
                macro_name = name,
                by_name = compiled.cbn_value.is_some(),
                by_value = compiled.cbv_value.is_some(),
                "no normal form within budget"
            );
        }

        (compiled, normal.trace)
    }

    /// Orders all macros so that dependencies come first.
    ///
    /// Returns the offending cycle if there is one.
    fn dependency_order(&self) -> Result<Vec<String>, Vec<String>> {
        let mut marks = HashMap::new();
        let mut stack = Vec::new();
        let mut order = Vec::with_capacity(self.definitions.len());
        for name in self.definitions.keys() {
            self.visit(name, &mut marks, &mut stack, &mut order)?;
        }
        Ok(order)
    }

    fn visit<'t>(
        &'t self,
        name: &'t str,
        marks: &mut HashMap<&'t str, Mark>,
        stack: &mut Vec<&'t str>,
        order: &mut Vec<String>,
    ) -> Result<(), Vec<String>> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|n| *n == name).unwrap_or(0);
                let mut cycle: Vec<String> =
                    stack[start..].iter().map(ToString::to_string).collect();
                cycle.push(name.to_string());
                return Err(cycle);
            }
            None => {}
        }
        let Some(definition) = self.definitions.get(name) else {
            return Ok(());
        };

        marks.insert(name, Mark::Visiting);
        stack.push(name);
        for dependency in definition.dependencies() {
            if let Some((key, _)) = self.definitions.get_key_value(dependency.as_str()) {
                self.visit(key, marks, stack, order)?;
            }
        }
        stack.pop();
        marks.insert(name, Mark::Done);
        order.push(name.to_string());
        Ok(())
    }
}
