use super::ir::{
    truncate_bits, BinOp, CastOp, Function, GenIntrinsic, Inst, InstId, InstKind, IntPredicate,
    Type, Value,
};

/// Inserts instructions before a fixed position, folding constants.
pub struct Builder<'f> {
    func: &'f mut Function,
    before: InstId,
}

impl<'f> Builder<'f> {
    pub fn before(func: &'f mut Function, at: InstId) -> Self {
        Self { func, before: at }
    }

    pub fn func(&self) -> &Function {
        self.func
    }

    pub fn ty(&self, value: &Value) -> Type {
        self.func
            .value_ty(value)
            .unwrap_or_else(|| panic!("value {:?} has no type", value))
    }

    fn emit(&mut self, kind: InstKind, ty: Type) -> Value {
        let id = self.func.insert_before(
            self.before,
            Inst {
                kind,
                ty: Some(ty),
            },
        );
        Value::Inst(id)
    }

    pub fn intrinsic(&mut self, intr: GenIntrinsic, ty: Type) -> Value {
        self.emit(InstKind::Intrinsic(intr), ty)
    }

    pub fn icmp(&mut self, pred: IntPredicate, lhs: Value, rhs: Value) -> Value {
        let bits = self.ty(&lhs).scalar_bits();
        if let (Some(a), Some(b)) = (lhs.as_const(), rhs.as_const()) {
            return Value::int(1, u64::from(pred.eval(a, b, bits)));
        }
        self.emit(InstKind::ICmp { pred, lhs, rhs }, Type::I1)
    }

    pub fn select(&mut self, cond: Value, on_true: Value, on_false: Value) -> Value {
        match cond.as_const() {
            Some(0) => on_false,
            Some(_) => on_true,
            None => {
                let ty = self.ty(&on_true);
                self.emit(
                    InstKind::Select {
                        cond,
                        on_true,
                        on_false,
                    },
                    ty,
                )
            }
        }
    }

    pub fn binary(&mut self, op: BinOp, lhs: Value, rhs: Value) -> Value {
        let ty = self.ty(&lhs);
        if let (Some(a), Some(b)) = (lhs.as_const(), rhs.as_const()) {
            return Value::int(ty.scalar_bits(), op.eval(a, b, ty.scalar_bits()));
        }
        self.emit(InstKind::Binary { op, lhs, rhs }, ty)
    }

    pub fn add(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(BinOp::Add, lhs, rhs)
    }

    pub fn mul(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(BinOp::Mul, lhs, rhs)
    }

    pub fn lshr(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(BinOp::LShr, lhs, rhs)
    }

    fn cast(&mut self, op: CastOp, value: Value, to: Type) -> Value {
        if self.ty(&value) == to {
            return value;
        }
        if let (Some(v), CastOp::ZExt | CastOp::Trunc, Type::Int(bits)) = (value.as_const(), op, to)
        {
            return Value::int(bits, truncate_bits(v, bits));
        }
        self.emit(InstKind::Cast { op, value }, to)
    }

    pub fn zext(&mut self, value: Value, to: Type) -> Value {
        self.cast(CastOp::ZExt, value, to)
    }

    pub fn trunc(&mut self, value: Value, to: Type) -> Value {
        self.cast(CastOp::Trunc, value, to)
    }

    pub fn bitcast(&mut self, value: Value, to: Type) -> Value {
        self.cast(CastOp::BitCast, value, to)
    }

    pub fn int_to_ptr(&mut self, value: Value) -> Value {
        self.emit(
            InstKind::Cast {
                op: CastOp::IntToPtr,
                value,
            },
            Type::Ptr,
        )
    }

    pub fn extract_element(&mut self, vector: Value, index: Value) -> Value {
        if let (Value::ConstVector { bits, lanes }, Some(i)) = (&vector, index.as_const()) {
            if let Some(&lane) = lanes.get(i as usize) {
                return Value::int(*bits, lane);
            }
        }
        let ty = self.ty(&vector).elem();
        self.emit(InstKind::ExtractElement { vector, index }, ty)
    }

    pub fn insert_element(&mut self, vector: Value, elem: Value, index: Value) -> Value {
        let ty = self.ty(&vector);
        self.emit(
            InstKind::InsertElement {
                vector,
                elem,
                index,
            },
            ty,
        )
    }

    pub fn load(&mut self, ptr: Value, ty: Type, align: u32) -> Value {
        self.emit(InstKind::Load { ptr, align }, ty)
    }
}
