use syn::{visit::Visit, Block, Expr};

/// Cyclomatic complexity of a function body: 1 plus one per decision point
/// (conditionals, loops, match arms, `?`, short-circuit operators). A pure
/// structural count; never below 1.
pub fn calculate_cyclomatic(block: &Block) -> u32 {
    let mut visitor = CyclomaticVisitor { complexity: 1 };
    visitor.visit_block(block);
    visitor.complexity
}

struct CyclomaticVisitor {
    complexity: u32,
}

fn decision_points(expr: &Expr) -> u32 {
    match expr {
        Expr::If(_) | Expr::While(_) | Expr::ForLoop(_) | Expr::Loop(_) | Expr::Try(_) => 1,
        Expr::Match(expr_match) => expr_match.arms.len() as u32,
        Expr::Binary(binary) if is_logical_operator(&binary.op) => 1,
        _ => 0,
    }
}

impl<'ast> Visit<'ast> for CyclomaticVisitor {
    fn visit_expr(&mut self, expr: &'ast Expr) {
        self.complexity += decision_points(expr);
        syn::visit::visit_expr(self, expr);
    }
}

fn is_logical_operator(op: &syn::BinOp) -> bool {
    matches!(op, syn::BinOp::And(_) | syn::BinOp::Or(_))
}

/// Maximum nesting depth of control flow in a block.
pub fn calculate_nesting(block: &Block) -> u32 {
    let mut visitor = NestingVisitor {
        current: 0,
        max: 0,
    };
    visitor.visit_block(block);
    visitor.max
}

struct NestingVisitor {
    current: u32,
    max: u32,
}

impl NestingVisitor {
    fn nested<F: FnOnce(&mut Self)>(&mut self, f: F) {
        self.current += 1;
        self.max = self.max.max(self.current);
        f(self);
        self.current -= 1;
    }
}

impl<'ast> Visit<'ast> for NestingVisitor {
    fn visit_expr(&mut self, expr: &'ast Expr) {
        match expr {
            Expr::If(_) | Expr::While(_) | Expr::ForLoop(_) | Expr::Loop(_) | Expr::Match(_) => {
                self.nested(|v| syn::visit::visit_expr(v, expr));
            }
            _ => syn::visit::visit_expr(self, expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_of(code: &str) -> Block {
        let func: syn::ItemFn = syn::parse_str(code).unwrap();
        *func.block
    }

    #[test]
    fn straight_line_code_is_one() {
        let block = block_of("fn f() { let x = 1; let y = x + 2; }");
        assert_eq!(calculate_cyclomatic(&block), 1);
    }

    #[test]
    fn each_branch_adds_one() {
        let block = block_of(
            "fn f(a: bool, b: bool) { if a { } if b { } while a { } for _ in 0..2 { } }",
        );
        assert_eq!(calculate_cyclomatic(&block), 5);
    }

    #[test]
    fn match_counts_arms() {
        let block = block_of("fn f(x: u8) { match x { 0 => {}, 1 => {}, _ => {} } }");
        assert_eq!(calculate_cyclomatic(&block), 4);
    }

    #[test]
    fn logical_operators_branch() {
        let block = block_of("fn f(a: bool, b: bool) { if a && b { } }");
        assert_eq!(calculate_cyclomatic(&block), 3);
    }

    #[test]
    fn nesting_depth() {
        let block = block_of("fn f(a: bool) { if a { while a { if a { } } } }");
        assert_eq!(calculate_nesting(&block), 3);
    }
}
