/// Value a testbench task resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    Int(i64),
    Float(f64),
    String(String),
    None,
}
