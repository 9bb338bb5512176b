#[cfg(test)]
pub mod test {
    use crate::macros::root;
    use crate::map;
    use crate::schema::{SchemaSection, Unexpected};
    use crate::validator::Validator;
    use crate::value::Map;

    pub fn property_map() -> Map {
        map! {
            "x_value" => 10.1,
            "y_value" => 20.2,
            "options" => map! {
                "i_alpha" => 100,
                "f_beta" => -0.123,
                "b_gamma" => true,
                "epsilon" => map! {
                    "epsilon_x" => 10,
                    "epsilon_y" => 20,
                    "epsilon_z" => 30,
                },
                "s_delta" => "delta.dat",
            },
            "z_value" => 30.3,
            "miscellanea" => map! { "a" => 1, "b" => 2 },
        }
    }

    /// `Section::dump` of [`property_map`].
    pub const PROPERTY_DUMP: &str = "\
x_value = 10.1
y_value = 20.2
[options]
    i_alpha = 100
    f_beta = -0.123
    b_gamma = True
    [epsilon]
        epsilon_x = 10
        epsilon_y = 20
        epsilon_z = 30
    s_delta = 'delta.dat'
z_value = 30.3
[miscellanea]
    a = 1
    b = 2
";

    fn validator(kind: &str, args: Map) -> Validator {
        Validator::new(kind, args).unwrap()
    }

    /// A schema touching every argument style: bounds, choices, lengths,
    /// item arguments, deferred arguments and a non-default policy.
    pub fn sample_schema() -> SchemaSection {
        let mut schema = SchemaSection::new();
        schema
            .add_option("name", validator("Str", map! { "min_len" => 1 }))
            .unwrap();
        schema
            .add_option(
                "port",
                validator("Int", map! { "min" => 1, "max" => 65535, "default" => 8080 }),
            )
            .unwrap();
        schema
            .add_option(
                "ratio",
                validator("Float", map! { "min" => 0.0, "max" => 1.0, "default" => 0.5 }),
            )
            .unwrap();
        schema
            .add_option(
                "mode",
                validator("Str", map! { "choices" => vec!["fast", "slow"], "default" => "fast" }),
            )
            .unwrap();
        schema
            .add_option(
                "tags",
                validator(
                    "StrList",
                    map! { "max_len" => 4, "item_min_len" => 1, "default" => vec!["web"] },
                ),
            )
            .unwrap();

        let low = root().item("limits").item("low");
        let mut limits = SchemaSection::new();
        limits.set_unexpected(Unexpected::Ignore);
        limits
            .add_option("low", validator("Int", map! { "default" => 0 }))
            .unwrap();
        limits
            .add_option(
                "high",
                validator("Int", map! { "min" => low.clone(), "default" => low + 10 }),
            )
            .unwrap();
        schema.add_section("limits", limits).unwrap();
        schema
    }

    /// `SchemaSection::dump` of [`sample_schema`].
    pub const SAMPLE_SCHEMA: &str = "\
name = Str(min_len=1)
port = Int(min=1, max=65535, default=8080)
ratio = Float(min=0.0, max=1.0, default=0.5)
mode = Str(choices=['fast', 'slow'], default='fast')
tags = StrList(max_len=4, item_min_len=1, default=['web'])
[limits]
    __unexpected__ = Ignore()
    low = Int(default=0)
    high = Int(min=ROOT['limits']['low'], default=ROOT['limits']['low'] + 10)
";

    /// A configuration file in the text dialect that satisfies [`sample_schema`].
    pub const SAMPLE_CONFIG: &str = "\
# service settings
name = 'api'
port = 9000

[limits]
    low = 5
    stray = True
";
}
