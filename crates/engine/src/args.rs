//! Positional argument lists
//!
//! A wrapped function takes its positional arguments as one tuple. Each
//! element is encoded separately so the record holds a flat `args` list,
//! and replay decodes the list back into the tuple.

use regrest_core::{
    CodecError, CodecResult, Decode, DecodeResult, Decoder, Encode, EncodedValue, Encoder,
    TypeRegistry,
};

/// A tuple of positional arguments
pub trait CallArgs: Sized {
    /// Number of positional arguments
    const ARITY: usize;

    /// Encode each argument in order
    fn encode_args(&self, encoder: &mut Encoder) -> CodecResult<Vec<EncodedValue>>;

    /// Rebuild the tuple from recorded arguments
    fn decode_args(args: &[EncodedValue], decoder: &mut Decoder) -> DecodeResult<Self>;

    /// Register every object type reachable from the arguments
    fn register(registry: &mut TypeRegistry);
}

fn check_arity(expected: usize, args: &[EncodedValue]) -> DecodeResult<()> {
    if args.len() != expected {
        return Err(CodecError::Malformed(format!(
            "expected {} positional arguments, got {}",
            expected,
            args.len()
        ))
        .into());
    }
    Ok(())
}

impl CallArgs for () {
    const ARITY: usize = 0;

    fn encode_args(&self, _: &mut Encoder) -> CodecResult<Vec<EncodedValue>> {
        Ok(Vec::new())
    }

    fn decode_args(args: &[EncodedValue], _: &mut Decoder) -> DecodeResult<Self> {
        check_arity(0, args)
    }

    fn register(_: &mut TypeRegistry) {}
}

macro_rules! call_args {
    ($len:expr => $($name:ident : $idx:tt),+) => {
        impl<$($name: Encode + Decode),+> CallArgs for ($($name,)+) {
            const ARITY: usize = $len;

            fn encode_args(&self, encoder: &mut Encoder) -> CodecResult<Vec<EncodedValue>> {
                Ok(vec![$(encoder.encode(&self.$idx)?),+])
            }

            fn decode_args(args: &[EncodedValue], decoder: &mut Decoder) -> DecodeResult<Self> {
                check_arity($len, args)?;
                Ok(($(decoder.decode::<$name>(&args[$idx])?,)+))
            }

            fn register(registry: &mut TypeRegistry) {
                $(registry.register::<$name>();)+
            }
        }
    };
}

call_args!(1 => A: 0);
call_args!(2 => A: 0, B: 1);
call_args!(3 => A: 0, B: 1, C: 2);
call_args!(4 => A: 0, B: 1, C: 2, D: 3);
call_args!(5 => A: 0, B: 1, C: 2, D: 3, E: 4);
call_args!(6 => A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
call_args!(7 => A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
call_args!(8 => A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);
