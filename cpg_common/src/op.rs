//! Boilerplate generator for arithmetic on single-field newtypes. The last argument names the inherent method of the
//! wrapped integer that does the work, so overflow behaviour is chosen at the call site.
//!
//! ```nocompile
//!   op!(binary Money, Add, add => saturating_add);                // Money + Money
//!   op!(inplace Money, AddAssign, add_assign => saturating_add);  // Money += Money
//!   op!(unary Money, Neg, neg => saturating_neg);                 // -Money
//! ```

#[macro_export]
macro_rules! op {
    (binary $t:ty, $imp:ident, $method:ident => $inner:ident) => {
        impl std::ops::$imp for $t {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self::Output {
                Self(self.0.$inner(rhs.0))
            }
        }
    };
    (inplace $t:ty, $imp:ident, $method:ident => $inner:ident) => {
        impl std::ops::$imp for $t {
            fn $method(&mut self, rhs: Self) {
                self.0 = self.0.$inner(rhs.0);
            }
        }
    };
    (unary $t:ty, $imp:ident, $method:ident => $inner:ident) => {
        impl std::ops::$imp for $t {
            type Output = Self;

            fn $method(self) -> Self::Output {
                Self(self.0.$inner())
            }
        }
    };
}
