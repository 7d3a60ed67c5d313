const PROJECT_TYPES: &[(&str, &str)] = &[
    ("residencial", "Residencial"),
    ("comercial", "Comercial"),
    ("institucional", "Institucional"),
    ("muebles", "Solo Muebles"),
    ("consulta", "Consulta General"),
];

const BUDGETS: &[(&str, &str)] = &[
    ("5k-15k", "500€ - 3.000€"),
    ("15k-30k", "3.000€ - 7.000€"),
    ("30k-50k", "7.000€ - 15.000€"),
    ("50k+", "Más de 15.000€"),
    ("consultar", "Prefiero consultar"),
];

pub const PHONE_NOT_PROVIDED: &str = "No proporcionado";
pub const BUDGET_NOT_SPECIFIED: &str = "No especificado";
pub const START_DATE_NOT_SPECIFIED: &str = "No especificada";

/// Display label for a project type key. Unknown keys are returned unchanged.
pub fn project_type_label(key: &str) -> &str {
    lookup(PROJECT_TYPES, key)
}

/// Display label for a budget range key. Unknown keys are returned unchanged.
pub fn budget_label(key: &str) -> &str {
    lookup(BUDGETS, key)
}

fn lookup<'a>(table: &'static [(&'static str, &'static str)], key: &'a str) -> &'a str {
    table
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, label)| *label)
        .unwrap_or(key)
}
