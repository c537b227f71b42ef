diesel::table! {
    brands (id) {
        id -> Int4,
        name -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    cart_items (id) {
        id -> Int4,
        cart_id -> Uuid,
        product_id -> Int4,
        quantity -> Int4,
    }
}

diesel::table! {
    categories (id) {
        id -> Int4,
        name -> Varchar,
        category_type -> Varchar,
        parent_id -> Nullable<Int4>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    content_images (id) {
        id -> Int4,
        position -> Varchar,
        image -> Bytea,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    inventories (id) {
        id -> Int4,
        product_id -> Int4,
        stock_level -> Int4,
        in_open -> Int4,
        change_type -> Varchar,
        change_date -> Timestamptz,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    order_items (id) {
        id -> Int4,
        order_id -> Int4,
        product_id -> Int4,
        quantity -> Int4,
        price_at_purchase -> Numeric,
    }
}

diesel::table! {
    orders (id) {
        id -> Int4,
        order_identifier -> Varchar,
        user_id -> Int4,
        order_status -> Varchar,
        currency -> Varchar,
        item_price -> Numeric,
        discount_amount -> Numeric,
        shipping_cost -> Numeric,
        total_price -> Numeric,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    payments (id) {
        id -> Int4,
        order_id -> Int4,
        payment_method -> Varchar,
        payment_status -> Varchar,
        amount -> Numeric,
        transaction_id -> Nullable<Varchar>,
        payment_date -> Timestamptz,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    product_attributes (id) {
        id -> Int4,
        name -> Varchar,
        description -> Text,
        product_id -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    product_images (id) {
        id -> Int4,
        product_id -> Int4,
        image -> Text,
        color -> Nullable<Varchar>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    products (id) {
        id -> Int4,
        name -> Varchar,
        description -> Text,
        sku -> Varchar,
        barcode -> Nullable<Varchar>,
        price -> Numeric,
        currency -> Varchar,
        category_id -> Int4,
        brand_id -> Nullable<Int4>,
        parent_id -> Nullable<Int4>,
        status -> Varchar,
        featured -> Bool,
        is_child -> Bool,
        color -> Varchar,
        size -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    reviews (id) {
        id -> Int4,
        user_id -> Int4,
        product_id -> Int4,
        rating -> Int4,
        comment -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    shipping_addresses (id) {
        id -> Int4,
        order_id -> Int4,
        address_line1 -> Varchar,
        address_line2 -> Varchar,
        city -> Varchar,
        state -> Varchar,
        postal_code -> Varchar,
        country -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    shopping_carts (id) {
        id -> Uuid,
        user_id -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    users (id) {
        id -> Int4,
        name -> Varchar,
        email -> Varchar,
        phone_number -> Nullable<Varchar>,
        role -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(cart_items -> products (product_id));
diesel::joinable!(cart_items -> shopping_carts (cart_id));
diesel::joinable!(inventories -> products (product_id));
diesel::joinable!(order_items -> orders (order_id));
diesel::joinable!(order_items -> products (product_id));
diesel::joinable!(orders -> users (user_id));
diesel::joinable!(payments -> orders (order_id));
diesel::joinable!(product_attributes -> products (product_id));
diesel::joinable!(product_images -> products (product_id));
diesel::joinable!(products -> brands (brand_id));
diesel::joinable!(products -> categories (category_id));
diesel::joinable!(reviews -> products (product_id));
diesel::joinable!(reviews -> users (user_id));
diesel::joinable!(shipping_addresses -> orders (order_id));
diesel::joinable!(shopping_carts -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    brands,
    cart_items,
    categories,
    content_images,
    inventories,
    order_items,
    orders,
    payments,
    product_attributes,
    product_images,
    products,
    reviews,
    shipping_addresses,
    shopping_carts,
    users,
);
